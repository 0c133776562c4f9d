use std::fmt;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use gattpipe_frame::{chunk, encode, Frame, FrameConfig, FrameError, ReassemblyBuffer};
use gattpipe_transport::{FragmentSink, NotifyChannel, TransportError};
use tracing::{debug, trace, warn};

use crate::config::PipeConfig;
use crate::error::{PipeError, Result};
use crate::pending::{PendingRead, Ticket};

/// Lifecycle of a pipe session.
///
/// `Open` is the only state in which sends and receives operate; `Closed` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeState {
    Idle,
    Subscribing,
    Open,
    Closed,
}

impl fmt::Display for PipeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipeState::Idle => "idle",
            PipeState::Subscribing => "subscribing",
            PipeState::Open => "open",
            PipeState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Open a pipe on a connected channel with default configuration.
pub fn open(channel: Arc<dyn NotifyChannel>) -> Result<PipeHandle> {
    open_with_config(channel, PipeConfig::default())
}

/// Open a pipe with explicit configuration.
///
/// Every session starts with an empty reassembly buffer; nothing buffered by
/// an earlier session on the same channel carries over. That earlier session
/// is closed when this one subscribes. A link that drops before the pipe
/// opens is reported as [`PipeError::SubscribeFailed`].
pub fn open_with_config(channel: Arc<dyn NotifyChannel>, config: PipeConfig) -> Result<PipeHandle> {
    let frame_config = FrameConfig {
        max_payload_size: config.max_payload_size,
    };
    let shared = Arc::new(Shared {
        channel: Arc::clone(&channel),
        config,
        inner: Mutex::new(Inner {
            state: PipeState::Idle,
            superseded: false,
            buffer: ReassemblyBuffer::with_config(frame_config),
            pending: PendingRead::new(),
        }),
    });

    shared.lock().state = PipeState::Subscribing;
    let sink: Arc<dyn FragmentSink> = Arc::new(SessionSink {
        shared: Arc::downgrade(&shared),
    });
    if let Err(err) = channel.subscribe(sink) {
        warn!(error = %err, "failed to enable notifications");
        shared.mark_closed("subscribe failed");
        return Err(PipeError::SubscribeFailed(err));
    }

    let (closed, superseded) = {
        let mut inner = shared.lock();
        if inner.state != PipeState::Closed {
            inner.state = PipeState::Open;
        }
        (inner.state == PipeState::Closed, inner.superseded)
    };
    if closed {
        warn!(superseded, "pipe closed while enabling notifications");
        // A newer session owns the subscription now.
        if !superseded {
            if let Err(err) = channel.unsubscribe() {
                debug!(error = %err, "unsubscribe after failed open");
            }
        }
        return Err(PipeError::SubscribeFailed(TransportError::Disconnected));
    }
    debug!(
        reported_budget = channel.max_fragment_size(),
        "pipe open"
    );

    Ok(PipeHandle { shared })
}

/// An open pipe.
///
/// One logical request/response exchange may be in flight at a time. The
/// handle is `Sync`; concurrent blocking receives fail with
/// [`PipeError::ConcurrentReadConflict`] rather than queueing. Dropping the
/// handle closes the pipe.
pub struct PipeHandle {
    shared: Arc<Shared>,
}

impl PipeHandle {
    /// Send `payload` and, if `await_response` is set, block for the next
    /// complete inbound frame.
    ///
    /// A response that completed before this call is returned immediately.
    /// Without `await_response` the result is always `Ok(None)` on success.
    pub fn send(&self, payload: &[u8], await_response: bool) -> Result<Option<Frame>> {
        if await_response {
            return self
                .exchange(payload, self.shared.config.response_timeout)
                .map(Some);
        }
        self.write_frame(payload)?;
        Ok(None)
    }

    /// Send `payload` and block for the response.
    pub fn request(&self, payload: &[u8]) -> Result<Frame> {
        self.exchange(payload, self.shared.config.response_timeout)
    }

    /// Send `payload` and wait at most `timeout` for the response.
    pub fn send_with_timeout(&self, payload: &[u8], timeout: Duration) -> Result<Frame> {
        self.exchange(payload, Some(timeout))
    }

    /// Block for the next complete inbound frame without sending anything.
    pub fn recv(&self) -> Result<Frame> {
        let ticket = self.shared.lock().reserve_read()?;
        self.await_frame(ticket, self.shared.config.response_timeout)
    }

    /// Like [`PipeHandle::recv`], bounded by `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Frame> {
        let ticket = self.shared.lock().reserve_read()?;
        self.await_frame(ticket, Some(timeout))
    }

    /// First-message data offered by the remote on session start.
    ///
    /// This side always initiates, so there never is any.
    pub fn get_initiation_data(&self) -> Option<Frame> {
        None
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipeState {
        self.shared.lock().state
    }

    /// Completed inbound frames nobody has consumed yet.
    pub fn queued_frames(&self) -> usize {
        self.shared.lock().buffer.completed_len()
    }

    /// Whether a caller is currently blocked waiting for a frame.
    pub fn awaiting_response(&self) -> bool {
        self.shared.lock().pending.is_armed()
    }

    /// Pipe configuration.
    pub fn config(&self) -> &PipeConfig {
        &self.shared.config
    }

    /// Close the pipe and release the channel.
    ///
    /// A caller blocked on a response is woken with [`PipeError::Closed`].
    /// Idempotent.
    pub fn close(&self) {
        if !self.shared.mark_closed("closed by caller") {
            return;
        }
        if let Err(err) = self.shared.channel.unsubscribe() {
            debug!(error = %err, "unsubscribe during close failed");
        }
        self.shared.channel.disconnect();
    }

    fn exchange(&self, payload: &[u8], timeout: Option<Duration>) -> Result<Frame> {
        let ticket = self.shared.lock().reserve_read()?;
        if let Err(err) = self.write_frame(payload) {
            self.shared.lock().pending.release(ticket);
            return Err(err);
        }
        self.await_frame(ticket, timeout)
    }

    fn write_frame(&self, payload: &[u8]) -> Result<()> {
        let shared = &self.shared;
        let result = write_chunked(shared.channel.as_ref(), &shared.config, payload, || {
            shared.lock().ensure_open()
        });
        if let Err(PipeError::TransportWrite {
            source: TransportError::Disconnected,
            ..
        }) = &result
        {
            shared.mark_closed("link lost during write");
        }
        result
    }

    fn await_frame(&self, ticket: Ticket, timeout: Option<Duration>) -> Result<Frame> {
        let rx = {
            let mut inner = self.shared.lock();
            if let Err(err) = inner.ensure_open() {
                inner.pending.release(ticket);
                return Err(err);
            }
            if let Some(frame) = inner.buffer.pop_oldest_completed() {
                inner.pending.release(ticket);
                trace!(len = frame.len(), "response already queued");
                return Ok(frame);
            }
            inner.pending.arm(ticket).ok_or(PipeError::Closed)?
        };

        let Some(timeout) = timeout else {
            return rx.recv().map_err(|_| PipeError::Closed);
        };
        match rx.recv_timeout(timeout) {
            Ok(frame) => Ok(frame),
            Err(RecvTimeoutError::Disconnected) => Err(PipeError::Closed),
            Err(RecvTimeoutError::Timeout) => self.expire_wait(ticket, &rx, timeout),
        }
    }

    /// Disarm a timed-out wait.
    ///
    /// A delivery that raced the timeout is already in `rx` and still wins.
    /// A close that raced it reports `Closed`, not `Timeout`.
    fn expire_wait(
        &self,
        ticket: Ticket,
        rx: &Receiver<Frame>,
        timeout: Duration,
    ) -> Result<Frame> {
        let closed = {
            let mut inner = self.shared.lock();
            inner.pending.release(ticket);
            inner.state == PipeState::Closed
        };
        match rx.try_recv() {
            Ok(frame) => Ok(frame),
            Err(_) if closed => Err(PipeError::Closed),
            Err(_) => {
                debug!(?timeout, "response wait timed out; slot disarmed");
                Err(PipeError::Timeout(timeout))
            }
        }
    }
}

impl Drop for PipeHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for PipeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("PipeHandle")
            .field("state", &inner.state)
            .field("queued_frames", &inner.buffer.completed_len())
            .field("awaiting_response", &inner.pending.is_armed())
            .finish()
    }
}

/// Encode `payload`, chunk it to the link's current budget and write the
/// fragments in order, stopping at the first failure.
///
/// `check` runs before every fragment and aborts the write when it fails.
pub(crate) fn write_chunked(
    channel: &dyn NotifyChannel,
    config: &PipeConfig,
    payload: &[u8],
    mut check: impl FnMut() -> Result<()>,
) -> Result<()> {
    if payload.len() > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: config.max_payload_size,
        }
        .into());
    }

    let wire = encode(payload)?;
    let budget = config.fragment_budget(channel.max_fragment_size());
    let fragments = chunk(&wire, budget);
    debug!(
        payload_len = payload.len(),
        fragment_size = budget.get(),
        fragments = fragments.len(),
        "sending frame"
    );

    for (index, fragment) in fragments.enumerate() {
        check()?;
        if let Err(source) = channel.write_fragment(fragment) {
            warn!(index, error = %source, "fragment write failed; aborting send");
            return Err(PipeError::TransportWrite { index, source });
        }
        trace!(index, len = fragment.len(), "fragment written");
    }
    Ok(())
}

struct Shared {
    channel: Arc<dyn NotifyChannel>,
    config: PipeConfig,
    inner: Mutex<Inner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_fragment_received(&self, fragment: &[u8]) {
        let mut inner = self.lock();
        if matches!(inner.state, PipeState::Idle | PipeState::Closed) {
            trace!(len = fragment.len(), state = %inner.state, "fragment ignored");
            return;
        }

        match inner.buffer.push_fragment(fragment) {
            Ok(0) => trace!(
                len = fragment.len(),
                buffered = inner.buffer.partial_len(),
                "fragment buffered"
            ),
            Ok(completed) => debug!(
                completed,
                queued = inner.buffer.completed_len(),
                "inbound frame complete"
            ),
            Err(err) => warn!(error = %err, "discarding malformed inbound frame"),
        }
        inner.deliver_completed();
    }

    /// Move to `Closed`, discarding buffered state and failing any waiter.
    ///
    /// Returns false if the pipe was already closed.
    fn mark_closed(&self, reason: &'static str) -> bool {
        let mut inner = self.lock();
        if inner.state == PipeState::Closed {
            return false;
        }
        let previous = inner.state;
        inner.state = PipeState::Closed;
        inner.buffer.reset();
        inner.pending.fail_closed();
        debug!(from = %previous, reason, "pipe closed");
        true
    }
}

struct Inner {
    state: PipeState,
    /// Another session subscribed on the same channel after this one.
    superseded: bool,
    buffer: ReassemblyBuffer,
    pending: PendingRead,
}

impl Inner {
    fn ensure_open(&self) -> Result<()> {
        match self.state {
            PipeState::Open => Ok(()),
            PipeState::Closed => Err(PipeError::Closed),
            other => Err(PipeError::NotOpen(other)),
        }
    }

    fn reserve_read(&mut self) -> Result<Ticket> {
        self.ensure_open()?;
        self.pending.reserve()
    }

    /// Hand the oldest completed frame to an armed waiter, if there is one.
    fn deliver_completed(&mut self) {
        if !self.pending.is_armed() {
            return;
        }
        let Some(frame) = self.buffer.pop_oldest_completed() else {
            return;
        };
        if let Err(frame) = self.pending.fulfill(frame) {
            self.buffer.requeue(frame);
        }
    }
}

/// Notification-path entry point registered with the channel.
struct SessionSink {
    shared: Weak<Shared>,
}

impl FragmentSink for SessionSink {
    fn on_fragment(&self, fragment: &[u8]) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_fragment_received(fragment);
        }
    }

    fn on_disconnect(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.mark_closed("link disconnected");
        }
    }

    // The channel now belongs to the newer session. Once closed here, close()
    // leaves it alone.
    fn on_superseded(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.lock().superseded = true;
            shared.mark_closed("superseded by a newer session");
        }
    }
}
