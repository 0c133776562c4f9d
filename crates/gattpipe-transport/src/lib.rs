//! Notification-channel capability for MTU-constrained links.
//!
//! A link in this layer is anything that can move one small opaque fragment
//! per operation and report inbound fragments through a callback, the way a
//! GATT characteristic does with write/notify:
//! - [`NotifyChannel`] is what a link implementation provides
//! - [`FragmentSink`] is what the layer above registers to hear inbound fragments
//!
//! This is the lowest layer of gattpipe. Discovery, connection setup and MTU
//! negotiation happen before a channel reaches this crate.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::MemoryChannel;
pub use traits::{FragmentSink, NotifyChannel};
