//! Time sources.

use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use syncbox_protocol::Timestamp;

/// Source of timestamps for `created_at`, `updated_at` and sync times.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Wall clock that never goes backwards and never repeats.
///
/// Each call returns at least one millisecond more than the previous one,
/// even if the system clock is adjusted. The guarantee holds within one
/// process only; a fresh clock starts again from wall time.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: Mutex<u64>,
}

impl SystemClock {
    /// Creates a system clock.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        let mut last = self.last.lock();
        let next = wall.max(last.saturating_add(1));
        *last = next;
        Timestamp::from_millis(next)
    }
}

/// A clock moved by hand, for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<u64>,
}

impl ManualClock {
    /// Creates a clock reading `start` milliseconds.
    pub fn new(start: u64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Sets the current reading.
    pub fn set(&self, millis: u64) {
        *self.now.lock() = millis;
    }

    /// Moves the clock forward.
    pub fn advance(&self, millis: u64) {
        let mut now = self.now.lock();
        *now = now.saturating_add(millis);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(*self.now.lock())
    }
}
