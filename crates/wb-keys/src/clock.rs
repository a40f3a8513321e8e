//! Wall clock abstraction.
//!
//! Timestamps throughout the protocol are Unix milliseconds. Components take a
//! `Clock` so that expiry, rotation and replay windows can be driven
//! deterministically in tests (see `mock::ManualClock`).

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time in Unix milliseconds.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_after_2023() {
        // 2023-11-14T22:13:20Z
        assert!(SystemClock.now_ms() > 1_700_000_000_000);
    }
}
