use std::sync::Arc;

use crate::error::Result;

/// Receives fragments delivered by a [`NotifyChannel`].
///
/// Callbacks may run on whatever thread the link uses for notification
/// delivery, concurrently with writes issued from other threads.
pub trait FragmentSink: Send + Sync {
    /// A fragment arrived from the remote end.
    fn on_fragment(&self, fragment: &[u8]);

    /// The link went away underneath the subscriber.
    fn on_disconnect(&self) {}

    /// Another sink replaced this one on the same channel.
    ///
    /// No further fragments will arrive here. The link itself is still up
    /// and now belongs to the newer subscriber.
    fn on_superseded(&self) {}
}

/// A connected, notification-capable link that moves one small fragment per
/// operation.
///
/// Implemented once per physical link type. Everything above this trait is
/// link-agnostic.
pub trait NotifyChannel: Send + Sync {
    /// Write one fragment (blocking, at most once per call).
    ///
    /// A failure is terminal for whatever logical message the fragment
    /// belonged to; callers do not retry individual fragments.
    fn write_fragment(&self, fragment: &[u8]) -> Result<()>;

    /// Register `sink` for inbound fragments and enable notifications.
    ///
    /// Subscribing again replaces the previous sink, which must then be told
    /// through [`FragmentSink::on_superseded`].
    fn subscribe(&self, sink: Arc<dyn FragmentSink>) -> Result<()>;

    /// Disable notifications and drop the registered sink.
    fn unsubscribe(&self) -> Result<()>;

    /// Raw per-operation budget reported by the link (e.g. the ATT MTU).
    ///
    /// May change between calls; callers query it per message rather than
    /// caching it.
    fn max_fragment_size(&self) -> usize;

    /// Release the link.
    fn disconnect(&self) {}
}
