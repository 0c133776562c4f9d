use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::traits::{FragmentSink, NotifyChannel};

/// In-process loopback link.
///
/// [`MemoryChannel::pair`] returns two linked ends: a fragment written on one
/// end is delivered to the other end's sink on the writer's thread. Each end
/// records what it wrote and supports fault injection, which makes it the
/// channel of choice for tests and local demos.
pub struct MemoryChannel {
    label: &'static str,
    link: Arc<AtomicBool>,
    peer: OnceLock<Weak<MemoryChannel>>,
    state: Mutex<EndpointState>,
}

#[derive(Default)]
struct EndpointState {
    sink: Option<Arc<dyn FragmentSink>>,
    max_fragment_size: usize,
    written: Vec<Bytes>,
    write_attempts: usize,
    fail_write_at: Option<usize>,
    fail_next_subscribe: bool,
}

impl MemoryChannel {
    fn new(label: &'static str, link: Arc<AtomicBool>, max_fragment_size: usize) -> Self {
        Self {
            label,
            link,
            peer: OnceLock::new(),
            state: Mutex::new(EndpointState {
                max_fragment_size,
                ..EndpointState::default()
            }),
        }
    }

    /// Create two connected ends sharing one link.
    ///
    /// The first end plays the central (the side that opens pipes), the second
    /// the peripheral.
    pub fn pair(max_fragment_size: usize) -> (Arc<Self>, Arc<Self>) {
        let link = Arc::new(AtomicBool::new(true));
        let central = Arc::new(Self::new("central", Arc::clone(&link), max_fragment_size));
        let peripheral = Arc::new(Self::new("peripheral", link, max_fragment_size));
        let _ = central.peer.set(Arc::downgrade(&peripheral));
        let _ = peripheral.peer.set(Arc::downgrade(&central));
        (central, peripheral)
    }

    /// Create a single connected end with nobody on the other side.
    ///
    /// Writes are recorded and go nowhere; inbound traffic comes from
    /// [`MemoryChannel::inject`].
    pub fn standalone(max_fragment_size: usize) -> Arc<Self> {
        Arc::new(Self::new(
            "standalone",
            Arc::new(AtomicBool::new(true)),
            max_fragment_size,
        ))
    }

    /// Deliver `fragment` to this end's sink as if the remote had written it.
    ///
    /// Safe to call from any thread. Dropped when the link is down.
    pub fn inject(&self, fragment: &[u8]) {
        if !self.is_connected() {
            trace!(end = self.label, "link down; injected fragment dropped");
            return;
        }
        self.deliver(fragment);
    }

    /// Make the `n`-th subsequent write attempt (1-based) fail.
    pub fn fail_write_at(&self, n: usize) {
        let mut state = self.lock();
        state.fail_write_at = Some(state.write_attempts + n.max(1));
    }

    /// Make the next subscribe call fail.
    pub fn fail_next_subscribe(&self) {
        self.lock().fail_next_subscribe = true;
    }

    /// Change the budget reported by [`NotifyChannel::max_fragment_size`].
    pub fn set_max_fragment_size(&self, max_fragment_size: usize) {
        self.lock().max_fragment_size = max_fragment_size;
    }

    /// Tear the link down for both ends, notifying any subscribed sinks.
    pub fn sever(&self) {
        if !self.link.swap(false, Ordering::SeqCst) {
            return;
        }
        debug!(end = self.label, "link severed");

        let own = self.lock().sink.take();
        if let Some(sink) = own {
            sink.on_disconnect();
        }
        if let Some(peer) = self.peer() {
            let remote = peer.lock().sink.take();
            if let Some(sink) = remote {
                sink.on_disconnect();
            }
        }
    }

    /// Fragments successfully written on this end, in order.
    pub fn written_fragments(&self) -> Vec<Bytes> {
        self.lock().written.clone()
    }

    /// Number of write attempts on this end, including failed ones.
    pub fn write_attempts(&self) -> usize {
        self.lock().write_attempts
    }

    /// Whether the shared link is still up.
    pub fn is_connected(&self) -> bool {
        self.link.load(Ordering::SeqCst)
    }

    /// Whether a sink is currently registered on this end.
    pub fn is_subscribed(&self) -> bool {
        self.lock().sink.is_some()
    }

    fn deliver(&self, fragment: &[u8]) {
        let sink = self.lock().sink.clone();
        match sink {
            Some(sink) => sink.on_fragment(fragment),
            None => trace!(
                end = self.label,
                len = fragment.len(),
                "no subscriber; fragment dropped"
            ),
        }
    }

    fn peer(&self) -> Option<Arc<MemoryChannel>> {
        self.peer.get().and_then(Weak::upgrade)
    }

    fn lock(&self) -> MutexGuard<'_, EndpointState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NotifyChannel for MemoryChannel {
    fn write_fragment(&self, fragment: &[u8]) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }

        {
            let mut state = self.lock();
            state.write_attempts += 1;
            let attempt = state.write_attempts;

            if state.fail_write_at == Some(attempt) {
                state.fail_write_at = None;
                return Err(TransportError::WriteRejected(format!(
                    "injected failure on write {attempt}"
                )));
            }
            if fragment.len() > state.max_fragment_size {
                return Err(TransportError::WriteRejected(format!(
                    "fragment of {} bytes exceeds link budget {}",
                    fragment.len(),
                    state.max_fragment_size
                )));
            }
            state.written.push(Bytes::copy_from_slice(fragment));
        }

        trace!(end = self.label, len = fragment.len(), "fragment written");
        if let Some(peer) = self.peer() {
            peer.deliver(fragment);
        }
        Ok(())
    }

    fn subscribe(&self, sink: Arc<dyn FragmentSink>) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }

        let replaced = {
            let mut state = self.lock();
            if state.fail_next_subscribe {
                state.fail_next_subscribe = false;
                return Err(TransportError::SubscribeRejected(
                    "injected subscribe failure".to_string(),
                ));
            }
            state.sink.replace(sink)
        };
        debug!(end = self.label, "notifications enabled");

        if let Some(previous) = replaced {
            debug!(end = self.label, "previous subscriber superseded");
            previous.on_superseded();
        }
        Ok(())
    }

    fn unsubscribe(&self) -> Result<()> {
        match self.lock().sink.take() {
            Some(_) => {
                debug!(end = self.label, "notifications disabled");
                Ok(())
            }
            None => Err(TransportError::NotSubscribed),
        }
    }

    fn max_fragment_size(&self) -> usize {
        self.lock().max_fragment_size
    }

    fn disconnect(&self) {
        self.sever();
    }
}

impl std::fmt::Debug for MemoryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChannel")
            .field("end", &self.label)
            .field("connected", &self.is_connected())
            .finish()
    }
}
