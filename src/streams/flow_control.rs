//! Per-stream and per-session flow-control counters. Two independent
//! shapes exist because the two directions behave differently: a send
//! window is simply decremented by what we transmit and incremented by
//! what the peer authorizes; a recv window additionally tracks how many
//! bytes have arrived but not yet been acknowledged back to the peer, so
//! that `WINDOW_UPDATE`s can be batched rather than sent per-byte.

use crate::error::{Reason, SendError, UserError};
use crate::proto::{WindowSize, MAX_WINDOW_SIZE};

/// Tracks how much the peer has authorized us to send. Decremented when a
/// DATA frame is enqueued (not merely composed — the decrement must be
/// atomic with enqueue so two racing producers can't both believe they
/// have the same capacity); incremented by received `WINDOW_UPDATE`.
#[derive(Debug, Clone, Copy)]
pub struct SendWindow {
    window: WindowSize,
}

impl SendWindow {
    pub fn new(initial: WindowSize) -> SendWindow {
        SendWindow { window: initial }
    }

    pub fn window(&self) -> WindowSize {
        self.window
    }

    pub fn is_positive(&self) -> bool {
        self.window > 0
    }

    /// Applies a received `WINDOW_UPDATE` delta. A delta of zero is a
    /// protocol violation on the wire (the codec rejects it before this is
    /// called); an overflow past `MAX_WINDOW_SIZE` is this function's to
    /// catch.
    pub fn increase(&mut self, delta: WindowSize) -> Result<(), SendError> {
        let next = self.window.checked_add(delta).ok_or(SendError::User(UserError::WindowOverflow))?;
        if next > MAX_WINDOW_SIZE {
            return Err(SendError::User(UserError::WindowOverflow));
        }
        self.window = next;
        Ok(())
    }

    /// Reflects that `amount` bytes of DATA were just enqueued. Caller must
    /// ensure `amount <= window` — this is an accounting primitive, not a
    /// gate; the gate is "how much may I enqueue", answered by `window()`.
    pub fn send_data(&mut self, amount: WindowSize) {
        debug_assert!(amount <= self.window, "send exceeded its own flow-control window");
        self.window -= amount;
    }

    /// Applied when a SETTINGS frame changes `INITIAL_WINDOW_SIZE`: every
    /// existing stream's send window shifts by the delta between the old
    /// and new initial value, even negative, per the boundary behavior
    /// that a shrink may legitimately stall an already-open stream.
    pub fn apply_settings_delta(&mut self, delta: i64) {
        self.window += delta;
    }
}

/// Tracks how much of our advertised receive capacity the peer has used,
/// and how many of those bytes we have not yet acknowledged back via
/// `WINDOW_UPDATE`.
#[derive(Debug, Clone, Copy)]
pub struct RecvWindow {
    window: WindowSize,
    unacked: WindowSize,
}

impl RecvWindow {
    pub fn new(initial: WindowSize) -> RecvWindow {
        RecvWindow {
            window: initial,
            unacked: 0,
        }
    }

    pub fn window(&self) -> WindowSize {
        self.window
    }

    /// Called when a DATA frame of `size` bytes arrives. Receiving more
    /// than the advertised window is a flow-control violation; `reason` is
    /// returned rather than asserted because the caller decides whether
    /// this is stream- or session-scoped (and therefore RST vs GOAWAY).
    pub fn receive(&mut self, size: WindowSize) -> Result<(), Reason> {
        if size > self.window {
            return Err(Reason::FlowControlError);
        }
        self.window -= size;
        self.unacked += size;
        Ok(())
    }

    /// Returns the delta to advertise via `WINDOW_UPDATE` and resets the
    /// unacked counter, if and only if unacked bytes exceed half of
    /// `initial`. Returns `None` otherwise, meaning no frame should be
    /// sent yet.
    pub fn take_update(&mut self, initial: WindowSize) -> Option<WindowSize> {
        if self.unacked > initial / 2 {
            let delta = self.unacked;
            self.unacked = 0;
            self.window += delta;
            Some(delta)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_window_decrements_on_data_and_increments_on_update() {
        let mut w = SendWindow::new(5);
        w.send_data(5);
        assert_eq!(w.window(), 0);
        assert!(!w.is_positive());

        w.increase(10).unwrap();
        assert_eq!(w.window(), 10);
    }

    #[test]
    fn send_window_overflow_is_rejected() {
        let mut w = SendWindow::new(MAX_WINDOW_SIZE - 1);
        assert!(w.increase(10).is_err());
    }

    #[test]
    fn settings_shrink_can_drive_window_negative() {
        let mut w = SendWindow::new(100);
        w.apply_settings_delta(-150);
        assert_eq!(w.window(), -50);
        assert!(!w.is_positive());
    }

    #[test]
    fn recv_window_batches_window_updates() {
        let mut r = RecvWindow::new(100);
        r.receive(40).unwrap();
        assert_eq!(r.take_update(100), None);

        r.receive(30).unwrap();
        assert_eq!(r.take_update(100), Some(70));
        assert_eq!(r.take_update(100), None);
    }

    #[test]
    fn recv_window_violation_is_flagged() {
        let mut r = RecvWindow::new(10);
        assert!(r.receive(11).is_err());
    }
}
