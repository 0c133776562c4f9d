//! Chunked request/response byte pipe over MTU-constrained notify/write links.
//!
//! gattpipe turns a link that only moves small fragments (a GATT
//! characteristic with write and notify, for example) into a message pipe:
//! payloads of any size go out as length-prefixed frames sliced to the link
//! budget, and inbound fragments are reassembled into whole responses.
//!
//! # Crate Structure
//!
//! - [`transport`]: the channel capability a link must provide, plus an in-memory loopback
//! - [`frame`]: length prefix, chunking and reassembly
//! - [`pipe`]: the blocking request/response session (behind the `pipe` feature)

/// Re-export transport types.
pub mod transport {
    pub use gattpipe_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use gattpipe_frame::*;
}

/// Re-export pipe types (requires `pipe` feature).
#[cfg(feature = "pipe")]
pub mod pipe {
    pub use gattpipe_pipe::*;
}
