use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Length prefix: a little-endian `u32` counting itself plus the payload.
pub const PREFIX_SIZE: usize = 4;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Largest payload whose total length still fits in the prefix.
const MAX_WIRE_PAYLOAD: usize = u32::MAX as usize - PREFIX_SIZE;

/// A complete inbound or outbound message, without its prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (prefix + payload).
    pub fn wire_size(&self) -> usize {
        PREFIX_SIZE + self.payload.len()
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Consume the frame and return its payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        self.payload.as_ref()
    }
}

/// Encode a payload into a standalone wire frame.
///
/// Wire format:
/// ```text
/// ┌─────────────────────────┬──────────────────────┐
/// │ Total length (4B LE)    │ Payload              │
/// │ = 4 + payload length    │ (total - 4 bytes)    │
/// └─────────────────────────┴──────────────────────┘
/// ```
pub fn encode(payload: &[u8]) -> Result<Bytes> {
    let mut dst = BytesMut::new();
    encode_into(payload, &mut dst)?;
    Ok(dst.freeze())
}

/// Append the wire encoding of `payload` to `dst`.
pub fn encode_into(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_WIRE_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_WIRE_PAYLOAD,
        });
    }
    let total = PREFIX_SIZE + payload.len();
    dst.reserve(total);
    dst.put_u32_le(total as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Read the total frame length from the leading prefix.
///
/// Returns `None` until all four prefix bytes are present. That is a "not
/// yet" signal, not an error.
pub fn decode_prefix(src: &[u8]) -> Option<usize> {
    let prefix: [u8; PREFIX_SIZE] = src.get(..PREFIX_SIZE)?.try_into().ok()?;
    Some(u32::from_le_bytes(prefix) as usize)
}

/// Decode the first frame from a buffer without consuming it.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// Bytes after the first frame are ignored.
pub fn decode(src: &[u8]) -> Result<Option<Bytes>> {
    let Some(total) = decode_prefix(src) else {
        return Ok(None);
    };
    check_total(total)?;
    if src.len() < total {
        return Ok(None);
    }
    Ok(Some(Bytes::copy_from_slice(&src[PREFIX_SIZE..total])))
}

/// Decode a frame from an accumulating buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer and leaves any
/// trailing bytes of the next frame in place.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    let Some(total) = decode_prefix(src) else {
        return Ok(None); // Need more data
    };
    check_total(total)?;

    let payload_len = total - PREFIX_SIZE;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    if src.len() < total {
        return Ok(None); // Need more data
    }

    src.advance(PREFIX_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame { payload }))
}

fn check_total(total: usize) -> Result<()> {
    if total < PREFIX_SIZE {
        return Err(FrameError::InvalidLength {
            len: total,
            min: PREFIX_SIZE,
        });
    }
    Ok(())
}

/// Configuration for frame decoding.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
