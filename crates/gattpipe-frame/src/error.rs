/// Errors that can occur during frame encoding/decoding and reassembly.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured (or wire-representable) maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A length prefix smaller than the prefix itself.
    #[error("invalid frame length prefix {len} (minimum {min})")]
    InvalidLength { len: usize, min: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
