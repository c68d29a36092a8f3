//! Simulated-time source for synchronized simulation runs
//!
//! The protocol state machines never read wall-clock time: "now" is a
//! `Duration` since scenario start, advanced exclusively by the embedding
//! discrete-event scheduler (or a test harness). Timers compare against
//! this value when polled.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Simulated clock advanced by the host scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimClock {
    now: Duration,
}

impl SimClock {
    /// Creates a clock at scenario start (t = 0).
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current simulated time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Advances the clock by the given amount.
    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    /// Returns true if the clock is at scenario start.
    pub fn is_initial(&self) -> bool {
        self.now == Duration::ZERO
    }
}

impl std::fmt::Display for SimClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t={:?}", self.now)
    }
}
