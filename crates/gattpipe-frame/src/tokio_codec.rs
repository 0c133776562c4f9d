//! `tokio-util` codec for carrying pipe frames over an ordinary byte stream.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_into, Frame, FrameConfig};
use crate::error::{FrameError, Result};

/// Same wire format as the chunked pipe, for `Framed` streams.
#[derive(Debug, Clone, Default)]
pub struct PipeFrameCodec {
    config: FrameConfig,
}

impl PipeFrameCodec {
    /// Create a codec with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self { config }
    }
}

impl Decoder for PipeFrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        decode_frame(src, self.config.max_payload_size)
    }
}

impl Encoder<Bytes> for PipeFrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        if item.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: item.len(),
                max: self.config.max_payload_size,
            });
        }
        encode_into(&item, dst)
    }
}
