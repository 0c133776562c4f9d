//! Length-prefixed framing with chunking and reassembly for MTU-constrained links.
//!
//! Every message on the wire is a 4-byte little-endian total length (counting
//! the prefix itself) followed by the payload. The encoded frame is sliced into
//! link-sized fragments with no per-fragment header; the receiver recovers
//! message boundaries purely by counting bytes against the prefix.
//!
//! - [`codec`] encodes and decodes the prefix
//! - [`chunk`] splits an encoded frame into fragments
//! - [`reassembly`] turns an arbitrary fragment stream back into frames

pub mod chunk;
pub mod codec;
pub mod error;
pub mod reassembly;
#[cfg(feature = "async")]
pub mod tokio_codec;

pub use chunk::{
    chunk, fragment_budget, fragment_count, Fragments, ATT_WRITE_OVERHEAD, DEFAULT_FRAGMENT_SIZE,
};
pub use codec::{
    decode, decode_frame, decode_prefix, encode, encode_into, Frame, FrameConfig,
    DEFAULT_MAX_PAYLOAD, PREFIX_SIZE,
};
pub use error::{FrameError, Result};
pub use reassembly::ReassemblyBuffer;
#[cfg(feature = "async")]
pub use tokio_codec::PipeFrameCodec;
