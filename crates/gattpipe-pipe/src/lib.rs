//! Blocking request/response pipe over chunked notification channels.
//!
//! This is the "just works" layer. Open a pipe on a connected
//! [`NotifyChannel`](gattpipe_transport::NotifyChannel), send payloads of any
//! size, and block for the reassembled response while fragments arrive on the
//! link's notification callback.

pub mod config;
pub mod echo;
pub mod error;
mod pending;
pub mod session;

pub use config::PipeConfig;
pub use echo::EchoResponder;
pub use error::{PipeError, Result};
pub use session::{open, open_with_config, PipeHandle, PipeState};
