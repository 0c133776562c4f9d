//! Remote-side responder for loopback links and tests.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use gattpipe_frame::{FrameConfig, ReassemblyBuffer};
use gattpipe_transport::{FragmentSink, NotifyChannel, TransportError};
use tracing::{debug, warn};

use crate::config::PipeConfig;
use crate::session::write_chunked;

type Reply = Box<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

/// Answers every complete inbound frame with one frame written back on the
/// same channel.
///
/// Replies go out on the thread that delivered the last fragment, chunked to
/// the channel's current budget.
pub struct EchoResponder {
    channel: Weak<dyn NotifyChannel>,
    config: PipeConfig,
    buffer: Mutex<ReassemblyBuffer>,
    reply: Reply,
    answered: AtomicUsize,
}

impl EchoResponder {
    /// Subscribe a responder that sends every payload back unchanged.
    pub fn attach(
        channel: &Arc<dyn NotifyChannel>,
        config: PipeConfig,
    ) -> Result<Arc<Self>, TransportError> {
        Self::attach_with(channel, config, |payload| payload.to_vec())
    }

    /// Subscribe a responder that answers with `reply(payload)`.
    pub fn attach_with<F>(
        channel: &Arc<dyn NotifyChannel>,
        config: PipeConfig,
        reply: F,
    ) -> Result<Arc<Self>, TransportError>
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        let buffer = ReassemblyBuffer::with_config(FrameConfig {
            max_payload_size: config.max_payload_size,
        });
        let responder = Arc::new(Self {
            channel: Arc::downgrade(channel),
            config,
            buffer: Mutex::new(buffer),
            reply: Box::new(reply),
            answered: AtomicUsize::new(0),
        });
        channel.subscribe(responder.clone())?;
        debug!("echo responder attached");
        Ok(responder)
    }

    /// Number of replies written in full.
    pub fn frames_answered(&self) -> usize {
        self.answered.load(Ordering::SeqCst)
    }
}

impl FragmentSink for EchoResponder {
    fn on_fragment(&self, fragment: &[u8]) {
        let frames: Vec<_> = {
            let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(err) = buffer.push_fragment(fragment) {
                warn!(error = %err, "echo: discarding malformed frame");
            }
            std::iter::from_fn(|| buffer.pop_oldest_completed()).collect()
        };
        let Some(channel) = self.channel.upgrade() else {
            return;
        };

        for frame in frames {
            let reply = (self.reply)(&frame.payload);
            match write_chunked(channel.as_ref(), &self.config, &reply, || Ok(())) {
                Ok(()) => {
                    self.answered.fetch_add(1, Ordering::SeqCst);
                    debug!(
                        request_len = frame.len(),
                        reply_len = reply.len(),
                        "echo: replied"
                    );
                }
                Err(err) => warn!(error = %err, "echo: reply failed"),
            }
        }
    }

    fn on_disconnect(&self) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
        debug!("echo responder detached: link down");
    }
}

impl fmt::Debug for EchoResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EchoResponder")
            .field("frames_answered", &self.frames_answered())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use gattpipe_frame::{chunk, encode};
    use gattpipe_transport::MemoryChannel;

    use super::*;

    fn linked(max: usize) -> (Arc<MemoryChannel>, Arc<dyn NotifyChannel>) {
        let (central, peripheral) = MemoryChannel::pair(max);
        (central, peripheral)
    }

    #[test]
    fn echoes_reassembled_payload_in_chunks() {
        let (central, peripheral) = MemoryChannel::pair(23);
        let far_end: Arc<dyn NotifyChannel> = peripheral.clone();
        let responder = EchoResponder::attach(&far_end, PipeConfig::default()).unwrap();

        let request: Vec<u8> = (0..50).collect();
        let wire = encode(&request).unwrap();
        for fragment in chunk(&wire, PipeConfig::default().fragment_budget(23)) {
            central.write_fragment(fragment).unwrap();
        }
        assert_eq!(responder.frames_answered(), 1);

        let reply = peripheral.written_fragments();
        let sizes: Vec<usize> = reply.iter().map(|f| f.len()).collect();
        assert_eq!(sizes, vec![20, 20, 14]);

        let mut buffer = ReassemblyBuffer::new();
        for fragment in &reply {
            buffer.push_fragment(fragment).unwrap();
        }
        assert_eq!(
            buffer.pop_oldest_completed().unwrap().payload.as_ref(),
            request.as_slice()
        );
        assert!(buffer.is_idle());
    }

    #[test]
    fn custom_reply_is_applied() {
        let (central, peripheral) = MemoryChannel::pair(64);
        let far_end: Arc<dyn NotifyChannel> = peripheral.clone();
        let responder = EchoResponder::attach_with(&far_end, PipeConfig::default(), |p| {
            p.iter().rev().copied().collect()
        })
        .unwrap();

        central.write_fragment(&encode(b"abc").unwrap()).unwrap();
        assert_eq!(responder.frames_answered(), 1);
        let reply: Vec<u8> = peripheral
            .written_fragments()
            .iter()
            .flat_map(|f| f.iter().copied())
            .collect();
        assert_eq!(reply, encode(b"cba").unwrap().to_vec());
    }

    #[test]
    fn attach_fails_on_dead_link() {
        let (central, peripheral) = linked(23);
        central.sever();
        assert!(matches!(
            EchoResponder::attach(&peripheral, PipeConfig::default()),
            Err(TransportError::Disconnected)
        ));
    }
}
