// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timestamps and the injectable clock used for token expiry.
#[cfg(any(test, feature = "test_utils"))]
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// UNIX timestamp in seconds.
pub type Timestamp = u64;

/// Source of wall-clock time.
///
/// Threading the clock through explicitly (instead of reading the system time
/// inline) lets tests drive expiry boundaries deterministically.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Monotonic-enough wall clock backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX epoch")
            .as_secs()
    }
}

/// Manually-driven clock for tests.
#[cfg(any(test, feature = "test_utils"))]
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

#[cfg(any(test, feature = "test_utils"))]
impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn set(&self, now: Timestamp) {
        self.0.store(now, Ordering::Relaxed);
    }

    pub fn advance(&self, seconds: u64) {
        self.0.fetch_add(seconds, Ordering::Relaxed);
    }
}

#[cfg(any(test, feature = "test_utils"))]
impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ManualClock};

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now(), 1_000);
        clock.advance(3_600);
        assert_eq!(clock.now(), 4_600);
        clock.set(10);
        assert_eq!(clock.now(), 10);
    }
}
