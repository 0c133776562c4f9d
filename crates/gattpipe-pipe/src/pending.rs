//! Single-slot bridge between the notification path and one blocked caller.

use std::sync::mpsc::{self, Receiver, SyncSender};

use gattpipe_frame::Frame;
use tracing::debug;

use crate::error::{PipeError, Result};

/// Identifies one reservation of the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket(u64);

#[derive(Debug)]
enum Slot {
    Empty,
    /// Claimed by a caller that is still writing its request.
    Reserved(Ticket),
    /// A caller is blocked on the paired receiver. Dropping the sender
    /// without sending wakes it with a closed-pipe failure.
    Armed(Ticket, SyncSender<Frame>),
}

/// The pending-read cell.
///
/// Lives inside the session mutex; every transition happens under that lock.
#[derive(Debug)]
pub(crate) struct PendingRead {
    slot: Slot,
    next_ticket: u64,
}

impl PendingRead {
    pub(crate) fn new() -> Self {
        Self {
            slot: Slot::Empty,
            next_ticket: 0,
        }
    }

    /// Claim the slot for one exchange.
    pub(crate) fn reserve(&mut self) -> Result<Ticket> {
        if !matches!(self.slot, Slot::Empty) {
            return Err(PipeError::ConcurrentReadConflict);
        }
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.slot = Slot::Reserved(ticket);
        Ok(ticket)
    }

    /// Turn a reservation into an armed wait and hand back the receiving end.
    ///
    /// Returns `None` if `ticket` no longer holds the slot.
    pub(crate) fn arm(&mut self, ticket: Ticket) -> Option<Receiver<Frame>> {
        match self.slot {
            Slot::Reserved(held) if held == ticket => {
                let (tx, rx) = mpsc::sync_channel(1);
                self.slot = Slot::Armed(ticket, tx);
                Some(rx)
            }
            _ => None,
        }
    }

    /// Give the slot back. No-op if `ticket` no longer holds it.
    pub(crate) fn release(&mut self, ticket: Ticket) {
        let held = match &self.slot {
            Slot::Reserved(held) | Slot::Armed(held, _) => *held == ticket,
            Slot::Empty => false,
        };
        if held {
            self.slot = Slot::Empty;
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        matches!(self.slot, Slot::Armed(..))
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        matches!(self.slot, Slot::Empty)
    }

    /// Hand `frame` to the armed waiter, clearing the slot.
    ///
    /// The frame comes back if nobody is armed or the waiter has gone away.
    pub(crate) fn fulfill(&mut self, frame: Frame) -> std::result::Result<(), Frame> {
        match std::mem::replace(&mut self.slot, Slot::Empty) {
            Slot::Armed(_, tx) => tx.send(frame).map_err(|err| err.0),
            other => {
                self.slot = other;
                Err(frame)
            }
        }
    }

    /// Wake any armed waiter with a closed-pipe failure and clear the slot.
    pub(crate) fn fail_closed(&mut self) {
        if let Slot::Armed(ticket, tx) = std::mem::replace(&mut self.slot, Slot::Empty) {
            drop(tx);
            debug!(ticket = ticket.0, "pending read failed: pipe closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(bytes: &'static [u8]) -> Frame {
        Frame::new(bytes)
    }

    #[test]
    fn second_reservation_conflicts() {
        let mut pending = PendingRead::new();
        let ticket = pending.reserve().unwrap();
        assert!(matches!(
            pending.reserve(),
            Err(PipeError::ConcurrentReadConflict)
        ));

        pending.release(ticket);
        assert!(pending.is_empty());
        assert!(pending.reserve().is_ok());
    }

    #[test]
    fn fulfill_wakes_armed_receiver_once() {
        let mut pending = PendingRead::new();
        let ticket = pending.reserve().unwrap();
        let rx = pending.arm(ticket).unwrap();
        assert!(pending.is_armed());

        pending.fulfill(frame(b"reply")).unwrap();
        assert!(pending.is_empty());

        assert_eq!(rx.recv().unwrap().payload.as_ref(), b"reply");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn fulfill_without_armed_waiter_returns_frame() {
        let mut pending = PendingRead::new();
        assert_eq!(pending.fulfill(frame(b"x")).unwrap_err(), frame(b"x"));

        let ticket = pending.reserve().unwrap();
        assert_eq!(pending.fulfill(frame(b"y")).unwrap_err(), frame(b"y"));
        assert!(pending.arm(ticket).is_some());
    }

    #[test]
    fn fulfill_after_receiver_dropped_returns_frame() {
        let mut pending = PendingRead::new();
        let ticket = pending.reserve().unwrap();
        drop(pending.arm(ticket).unwrap());

        assert_eq!(pending.fulfill(frame(b"late")).unwrap_err(), frame(b"late"));
        assert!(pending.is_empty());
    }

    #[test]
    fn stale_ticket_cannot_arm_or_release() {
        let mut pending = PendingRead::new();
        let stale = pending.reserve().unwrap();
        pending.release(stale);
        let current = pending.reserve().unwrap();

        assert!(pending.arm(stale).is_none());
        pending.release(stale);
        assert!(!pending.is_empty());
        assert!(pending.arm(current).is_some());
    }

    #[test]
    fn fail_closed_wakes_waiter() {
        let mut pending = PendingRead::new();
        let ticket = pending.reserve().unwrap();
        let rx = pending.arm(ticket).unwrap();

        pending.fail_closed();
        assert!(rx.recv().is_err());
        assert!(pending.is_empty());
    }
}
