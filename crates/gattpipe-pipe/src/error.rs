use std::time::Duration;

use gattpipe_frame::FrameError;
use gattpipe_transport::TransportError;

use crate::session::PipeState;

/// Errors that can occur in pipe operations.
#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    /// A fragment write failed; fragments before `index` were already sent.
    #[error("fragment {index} write failed: {source}")]
    TransportWrite {
        index: usize,
        #[source]
        source: TransportError,
    },

    /// Notifications could not be enabled on the channel.
    #[error("subscribe failed: {0}")]
    SubscribeFailed(#[source] TransportError),

    /// Operation attempted before the pipe reached the open state.
    #[error("pipe not open (state: {0})")]
    NotOpen(PipeState),

    /// A blocking receive is already outstanding on this pipe.
    #[error("another caller is already waiting for a response")]
    ConcurrentReadConflict,

    /// The pipe was closed, locally or by the link.
    #[error("pipe closed")]
    Closed,

    /// No response arrived in time; the wait was disarmed.
    #[error("response timed out after {0:?}")]
    Timeout(Duration),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

pub type Result<T> = std::result::Result<T, PipeError>;
