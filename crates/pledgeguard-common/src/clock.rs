//! Shared time source
//!
//! All deadlines (campaign, milestone, voting) are compared against one clock
//! handed to every component at construction. Readings are Unix milliseconds
//! and never go backwards.

use std::sync::atomic::{AtomicI64, Ordering};

/// Monotonic millisecond clock
pub trait Clock: Send + Sync {
    /// Current time in Unix milliseconds
    fn now_millis(&self) -> i64;
}

/// Wall clock clamped to be monotonic
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        let wall = chrono::Utc::now().timestamp_millis();
        let prev = self.last.fetch_max(wall, Ordering::AcqRel);
        prev.max(wall)
    }
}

/// Deterministic clock for tests and simulations.
///
/// Time only advances when told to.
#[derive(Debug)]
pub struct ManualClock {
    current: AtomicI64,
}

impl ManualClock {
    pub fn new(initial_millis: i64) -> Self {
        Self {
            current: AtomicI64::new(initial_millis),
        }
    }

    /// Advance time by a number of milliseconds
    pub fn advance(&self, millis: i64) {
        self.current.fetch_add(millis.max(0), Ordering::AcqRel);
    }

    /// Move time forward to `millis`; earlier values are ignored
    pub fn set(&self, millis: i64) {
        self.current.fetch_max(millis, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.current.load(Ordering::Acquire)
    }
}
