//! Clock abstraction.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fmt::Debug;

/// A UTC timestamp.
pub type Timestamp = DateTime<Utc>;

/// Source of the current time.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current UTC time.
    fn now(&self) -> Timestamp;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A clock frozen at a given instant until moved explicitly.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<Timestamp>,
}

impl FixedClock {
    /// Creates a clock frozen at `now`.
    #[must_use]
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: Timestamp) {
        *self.now.write() = now;
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: chrono::TimeDelta) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        *self.now.read()
    }
}

/// Whole seconds from `now` until `when`, rounded to the nearest second.
///
/// Instants in the past yield zero.
#[must_use]
pub fn seconds_until(when: Timestamp, now: Timestamp) -> u64 {
    let millis = (when - now).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    u64::try_from((millis + 500) / 1000).unwrap_or(u64::MAX)
}
