//! Retransmission timer for PC5 signalling procedures
//!
//! Timers run on simulated time: a plain `Duration` since scenario start,
//! advanced by the host scheduler. A timer is armed with an expiry deadline
//! and checked by polling; it fires at most once per arming.

use std::time::Duration;

/// Single-shot, cancelable, reschedulable simulated-time timer.
///
/// Used for the PC5 signalling retransmission timers T5080 (direct link
/// establishment) and T5087 (direct link release).
#[derive(Debug, Clone, Default)]
pub struct RetransmissionTimer {
    deadline: Option<Duration>,
}

impl RetransmissionTimer {
    /// Creates a stopped timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer to fire `delay` after `now`. Rearming a running timer
    /// replaces its deadline.
    pub fn start(&mut self, now: Duration, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    /// Stops the timer. Idempotent.
    pub fn stop(&mut self) {
        self.deadline = None;
    }

    /// Checks the timer against the current simulated time.
    ///
    /// Returns `true` if the timer just expired; the timer then stops and
    /// will not fire again until rearmed. Polling a stopped timer is a no-op.
    pub fn poll(&mut self, now: Duration) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Returns true if the timer is armed and has not yet fired.
    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }
}
