use std::num::NonZeroUsize;
use std::time::Duration;

use gattpipe_frame::{
    fragment_budget, ATT_WRITE_OVERHEAD, DEFAULT_FRAGMENT_SIZE, DEFAULT_MAX_PAYLOAD,
};

/// Pipe behavior configuration.
#[derive(Debug, Clone)]
pub struct PipeConfig {
    /// Fixed per-write overhead subtracted from the link's reported budget.
    pub write_overhead: usize,
    /// Fragment size used when the reported budget does not exceed the overhead.
    pub fallback_fragment_size: NonZeroUsize,
    /// Maximum payload size in either direction.
    pub max_payload_size: usize,
    /// Bound on waits for a response. `None` waits until delivery or close.
    pub response_timeout: Option<Duration>,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            write_overhead: ATT_WRITE_OVERHEAD,
            fallback_fragment_size: DEFAULT_FRAGMENT_SIZE,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            response_timeout: None,
        }
    }
}

impl PipeConfig {
    /// Usable fragment size for a link currently reporting `reported` bytes.
    pub fn fragment_budget(&self, reported: usize) -> NonZeroUsize {
        fragment_budget(reported, self.write_overhead, self.fallback_fragment_size)
    }
}
