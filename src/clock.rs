//! Time sources for expiry arithmetic.
//!
//! Record timestamps are whole seconds, so every clock truncates sub-second
//! precision before handing out a value.

use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(0)
    }
}

/// A clock that only moves when told to. Used by tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Start at the given Unix timestamp (seconds)
    pub fn at(seconds: i64) -> Self {
        Self {
            now: Mutex::new(from_seconds(seconds)),
        }
    }

    pub fn set(&self, seconds: i64) {
        *self.now.lock() = from_seconds(seconds);
    }

    pub fn advance(&self, seconds: i64) {
        let mut now = self.now.lock();
        *now += chrono::Duration::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Unix seconds to a UTC timestamp; out-of-range values clamp to the epoch.
pub fn from_seconds(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::at(100);
        assert_eq!(clock.now().timestamp(), 100);

        clock.advance(61);
        assert_eq!(clock.now().timestamp(), 161);

        clock.set(5);
        assert_eq!(clock.now().timestamp(), 5);
    }

    #[test]
    fn test_system_clock_has_no_subseconds() {
        assert_eq!(SystemClock.now().timestamp_subsec_nanos(), 0);
    }
}
