use std::collections::VecDeque;

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 512;

/// Recovers complete frames from fragments delivered in arrival order.
///
/// Fragment boundaries need not line up with frame boundaries: a fragment may
/// end mid-prefix, carry the tail of one frame and the head of the next, or
/// hold several small frames at once. At most one frame is in progress at any
/// time; completed frames queue up in FIFO order until popped.
#[derive(Debug)]
pub struct ReassemblyBuffer {
    partial: BytesMut,
    completed: VecDeque<Frame>,
    config: FrameConfig,
}

impl ReassemblyBuffer {
    /// Create an empty buffer with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create an empty buffer with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            partial: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            completed: VecDeque::new(),
            config,
        }
    }

    /// Append one inbound fragment.
    ///
    /// Returns the number of frames this fragment completed. A malformed
    /// length prefix discards the in-progress bytes (frames completed earlier
    /// stay queued) and is reported as an error.
    pub fn push_fragment(&mut self, fragment: &[u8]) -> Result<usize> {
        self.partial.extend_from_slice(fragment);

        let mut completed = 0;
        loop {
            match decode_frame(&mut self.partial, self.config.max_payload_size) {
                Ok(Some(frame)) => {
                    trace!(len = frame.len(), "frame reassembled");
                    self.completed.push_back(frame);
                    completed += 1;
                }
                Ok(None) => return Ok(completed),
                Err(err) => {
                    trace!(
                        discarded = self.partial.len(),
                        "malformed prefix; dropping partial frame"
                    );
                    self.partial.clear();
                    return Err(err);
                }
            }
        }
    }

    /// Remove and return the earliest completed frame.
    pub fn pop_oldest_completed(&mut self) -> Option<Frame> {
        self.completed.pop_front()
    }

    /// Put a frame back at the head of the completed queue.
    pub fn requeue(&mut self, frame: Frame) {
        self.completed.push_front(frame);
    }

    /// Discard all buffered and queued state.
    pub fn reset(&mut self) {
        self.partial.clear();
        self.completed.clear();
    }

    /// Number of completed frames awaiting consumption.
    pub fn completed_len(&self) -> usize {
        self.completed.len()
    }

    /// Bytes accumulated for the frame currently in progress.
    pub fn partial_len(&self) -> usize {
        self.partial.len()
    }

    /// True when nothing is buffered or queued.
    pub fn is_idle(&self) -> bool {
        self.partial.is_empty() && self.completed.is_empty()
    }

    /// Current configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Default for ReassemblyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use proptest::prelude::*;

    use super::*;
    use crate::chunk::chunk;
    use crate::codec::{encode, PREFIX_SIZE};
    use crate::error::FrameError;

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn feed(buffer: &mut ReassemblyBuffer, wire: &[u8], fragment_size: usize) -> usize {
        chunk(wire, size(fragment_size))
            .map(|fragment| buffer.push_fragment(fragment).unwrap())
            .sum()
    }

    #[test]
    fn reassembles_three_fragment_frame() {
        let payload = vec![0xC3; 50];
        let wire = encode(&payload).unwrap();
        let mut buffer = ReassemblyBuffer::new();

        let mut fragments = chunk(&wire, size(20));
        assert_eq!(buffer.push_fragment(fragments.next().unwrap()).unwrap(), 0);
        assert_eq!(buffer.push_fragment(fragments.next().unwrap()).unwrap(), 0);
        assert_eq!(buffer.partial_len(), 40);
        assert_eq!(buffer.push_fragment(fragments.next().unwrap()).unwrap(), 1);

        let frame = buffer.pop_oldest_completed().unwrap();
        assert_eq!(frame.payload.as_ref(), payload.as_slice());
        assert!(buffer.is_idle());
    }

    #[test]
    fn fragment_crossing_frame_boundary() {
        let first = [0x11; 10];
        let second = [0x22; 10];
        let mut wire = encode(&first).unwrap().to_vec();
        wire.extend_from_slice(&encode(&second).unwrap());

        let mut buffer = ReassemblyBuffer::new();
        assert_eq!(feed(&mut buffer, &wire, 7), 2);

        assert_eq!(
            buffer.pop_oldest_completed().unwrap().payload.as_ref(),
            &first
        );
        assert_eq!(
            buffer.pop_oldest_completed().unwrap().payload.as_ref(),
            &second
        );
        assert!(buffer.pop_oldest_completed().is_none());
        assert_eq!(buffer.partial_len(), 0);
    }

    #[test]
    fn single_fragment_carrying_several_frames() {
        let mut wire = Vec::new();
        for payload in [&b"a"[..], b"", b"ccc"] {
            wire.extend_from_slice(&encode(payload).unwrap());
        }

        let mut buffer = ReassemblyBuffer::new();
        assert_eq!(buffer.push_fragment(&wire).unwrap(), 3);
        assert_eq!(buffer.completed_len(), 3);

        let payloads: Vec<Vec<u8>> = std::iter::from_fn(|| buffer.pop_oldest_completed())
            .map(|frame| frame.payload.to_vec())
            .collect();
        assert_eq!(payloads, vec![b"a".to_vec(), Vec::new(), b"ccc".to_vec()]);
    }

    #[test]
    fn prefix_split_across_fragments() {
        let wire = encode(b"split prefix").unwrap();
        let mut buffer = ReassemblyBuffer::new();

        assert_eq!(buffer.push_fragment(&wire[..1]).unwrap(), 0);
        assert_eq!(buffer.push_fragment(&wire[1..3]).unwrap(), 0);
        assert_eq!(buffer.partial_len(), 3);
        assert_eq!(buffer.push_fragment(&wire[3..]).unwrap(), 1);
        assert_eq!(
            buffer.pop_oldest_completed().unwrap().payload.as_ref(),
            b"split prefix"
        );
    }

    #[test]
    fn empty_fragment_is_harmless() {
        let mut buffer = ReassemblyBuffer::new();
        assert_eq!(buffer.push_fragment(&[]).unwrap(), 0);
        assert!(buffer.is_idle());
    }

    #[test]
    fn minimum_frame_completes_immediately() {
        let mut buffer = ReassemblyBuffer::new();
        assert_eq!(buffer.push_fragment(&encode(b"").unwrap()).unwrap(), 1);
        assert!(buffer.pop_oldest_completed().unwrap().is_empty());
    }

    #[test]
    fn short_prefix_discards_partial_but_keeps_completed() {
        let mut wire = encode(b"ok").unwrap().to_vec();
        wire.extend_from_slice(&2u32.to_le_bytes());
        wire.extend_from_slice(b"junk");

        let mut buffer = ReassemblyBuffer::new();
        let err = buffer.push_fragment(&wire).unwrap_err();
        assert!(matches!(err, FrameError::InvalidLength { len: 2, .. }));
        assert_eq!(buffer.partial_len(), 0);
        assert_eq!(buffer.completed_len(), 1);

        assert_eq!(buffer.push_fragment(&encode(b"next").unwrap()).unwrap(), 1);
        assert_eq!(buffer.pop_oldest_completed().unwrap().payload.as_ref(), b"ok");
        assert_eq!(
            buffer.pop_oldest_completed().unwrap().payload.as_ref(),
            b"next"
        );
    }

    #[test]
    fn oversized_prefix_rejected_before_payload_arrives() {
        let mut buffer = ReassemblyBuffer::with_config(FrameConfig {
            max_payload_size: 16,
        });
        let wire = encode(&[0u8; 64]).unwrap();

        let err = buffer.push_fragment(&wire[..PREFIX_SIZE]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge { size: 64, max: 16 }
        ));
        assert!(buffer.is_idle());
    }

    #[test]
    fn reset_discards_partial_and_queued_frames() {
        let mut buffer = ReassemblyBuffer::new();
        buffer.push_fragment(&encode(b"done").unwrap()).unwrap();
        buffer.push_fragment(&encode(b"in progress").unwrap()[..6]).unwrap();
        assert!(!buffer.is_idle());

        buffer.reset();
        assert!(buffer.is_idle());

        // Stale bytes must not bleed into the next frame.
        buffer.push_fragment(&encode(b"fresh").unwrap()).unwrap();
        assert_eq!(
            buffer.pop_oldest_completed().unwrap().payload.as_ref(),
            b"fresh"
        );
    }

    #[test]
    fn requeue_restores_fifo_head() {
        let mut buffer = ReassemblyBuffer::new();
        buffer.push_fragment(&encode(b"one").unwrap()).unwrap();
        buffer.push_fragment(&encode(b"two").unwrap()).unwrap();

        let head = buffer.pop_oldest_completed().unwrap();
        buffer.requeue(head);
        assert_eq!(buffer.pop_oldest_completed().unwrap().payload.as_ref(), b"one");
    }

    proptest! {
        #[test]
        fn chunked_frame_reassembles_exactly_once(
            payload in proptest::collection::vec(any::<u8>(), 0..1024),
            fragment_size in 1usize..96,
        ) {
            let wire = encode(&payload).unwrap();
            let mut buffer = ReassemblyBuffer::new();

            let completed = feed(&mut buffer, &wire, fragment_size);
            prop_assert_eq!(completed, 1);
            let frame = buffer.pop_oldest_completed().unwrap();
            prop_assert_eq!(frame.payload.as_ref(), payload.as_slice());
            prop_assert!(buffer.is_idle());
        }

        #[test]
        fn frame_stream_survives_any_fragmentation(
            payloads in proptest::collection::vec(
                proptest::collection::vec(any::<u8>(), 0..64),
                1..8,
            ),
            fragment_size in 1usize..40,
        ) {
            let mut wire = Vec::new();
            for payload in &payloads {
                wire.extend_from_slice(&encode(payload).unwrap());
            }

            let mut buffer = ReassemblyBuffer::new();
            prop_assert_eq!(feed(&mut buffer, &wire, fragment_size), payloads.len());
            for payload in &payloads {
                let frame = buffer.pop_oldest_completed().unwrap();
                prop_assert_eq!(frame.payload.as_ref(), payload.as_slice());
            }
            prop_assert!(buffer.is_idle());
        }
    }
}
