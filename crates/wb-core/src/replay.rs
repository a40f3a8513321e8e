//! Replay protection.
//!
//! Each token moves `unseen -> seen -> purged`. A message is accepted when its
//! timestamp lies within `window` of now and its token has not been seen under
//! any timestamp. Check-and-insert happens under one lock, so two concurrent
//! requests carrying the same token can never both be accepted.
//!
//! Seen entries are kept until both the first acceptance and the carried
//! timestamp are more than `window + grace` behind now. When the timestamp is
//! authenticated an entry that old would already fail the window check. When
//! it is not, a token relabelled with a fresh timestamp is rejected for at
//! least `window + grace` after its first acceptance.
//!
//! The guard is per process. Deployments with several replicas need a shared
//! seen-set.

use crate::error::ReplayReason;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wb_keys::{Clock, SystemClock};

/// Replay guard configuration.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Maximum distance between a message timestamp and now.
    pub window: Duration,
    /// Extra time seen entries are kept beyond the window.
    pub grace: Duration,
    /// Sweep after this many checks.
    pub sweep_every: u64,
    /// Sweep when this much time passed since the last sweep.
    pub sweep_interval: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(30),
            grace: Duration::from_secs(5),
            sweep_every: 1000,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

struct SeenEntry {
    timestamp: u64,
    first_seen: u64,
}

#[derive(Default)]
struct ReplayState {
    seen: HashMap<Vec<u8>, SeenEntry>,
    checks: u64,
    last_sweep: u64,
}

/// Timestamp freshness and token uniqueness check.
pub struct ReplayGuard {
    config: ReplayConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<ReplayState>,
}

impl ReplayGuard {
    /// Guard on the system clock.
    pub fn new(config: ReplayConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Guard on an explicit clock.
    pub fn with_clock(config: ReplayConfig, clock: Arc<dyn Clock>) -> Self {
        let last_sweep = clock.now_ms();
        Self {
            config,
            clock,
            state: Mutex::new(ReplayState {
                last_sweep,
                ..ReplayState::default()
            }),
        }
    }

    /// Guard configuration.
    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Accept `token` once, provided `timestamp` is fresh.
    ///
    /// # Errors
    ///
    /// - `Error::ReplayRejected(OutsideWindow)` if `|now - timestamp| > window`
    /// - `Error::ReplayRejected(Duplicate)` if the token was already accepted
    pub fn check(&self, timestamp: u64, token: &[u8]) -> Result<()> {
        let now = self.clock.now_ms();
        let window = self.config.window.as_millis() as u64;

        let skew_ms = now.abs_diff(timestamp);
        if skew_ms > window {
            tracing::warn!("Replay rejected: timestamp {} outside window ({} ms)", timestamp, skew_ms);
            return Err(Error::ReplayRejected(ReplayReason::OutsideWindow { skew_ms }));
        }

        let mut state = self.lock()?;

        state.checks += 1;
        if state.checks % self.config.sweep_every.max(1) == 0
            || now.saturating_sub(state.last_sweep) >= self.config.sweep_interval.as_millis() as u64
        {
            self.sweep_locked(&mut state, now);
        }

        if let Some(entry) = state.seen.get(token) {
            tracing::warn!(
                "Replay rejected: duplicate token at timestamp {} (first accepted with {})",
                timestamp,
                entry.timestamp
            );
            return Err(Error::ReplayRejected(ReplayReason::Duplicate));
        }
        state.seen.insert(
            token.to_vec(),
            SeenEntry {
                timestamp,
                first_seen: now,
            },
        );

        Ok(())
    }

    /// Purge entries whose first acceptance and timestamp are both strictly
    /// outside `window + grace`. Returns the number purged.
    pub fn sweep(&self) -> Result<usize> {
        let now = self.clock.now_ms();
        let mut state = self.lock()?;
        Ok(self.sweep_locked(&mut state, now))
    }

    /// Number of entries currently remembered.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.seen.len())
    }

    /// Whether no entries are remembered.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ReplayState>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("replay state lock poisoned".into()))
    }

    fn sweep_locked(&self, state: &mut ReplayState, now: u64) -> usize {
        let retention = (self.config.window + self.config.grace).as_millis() as u64;
        let before = state.seen.len();

        state
            .seen
            .retain(|_, entry| {
                now.saturating_sub(entry.first_seen) <= retention
                    || now.saturating_sub(entry.timestamp) <= retention
            });
        state.last_sweep = now;

        let purged = before - state.seen.len();
        if purged > 0 {
            tracing::debug!("Replay sweep purged {} entries", purged);
        }
        purged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wb_keys::mock::ManualClock;

    const NOW: u64 = 1_700_000_000_000;

    fn guard() -> (ReplayGuard, ManualClock) {
        let clock = ManualClock::new(NOW);
        let guard = ReplayGuard::with_clock(ReplayConfig::default(), Arc::new(clock.clone()));
        (guard, clock)
    }

    #[test]
    fn test_same_token_accepted_once() {
        let (guard, _) = guard();
        guard.check(NOW, b"nonce-1").unwrap();
        assert!(matches!(
            guard.check(NOW, b"nonce-1"),
            Err(Error::ReplayRejected(ReplayReason::Duplicate))
        ));
    }

    #[test]
    fn test_window_boundaries() {
        let (guard, _) = guard();
        assert!(matches!(
            guard.check(NOW - 40_000, b"n"),
            Err(Error::ReplayRejected(ReplayReason::OutsideWindow { skew_ms: 40_000 }))
        ));
        guard.check(NOW - 20_000, b"n").unwrap();
        guard.check(NOW - 30_000, b"edge").unwrap();
        assert!(guard.check(NOW - 30_001, b"edge").is_err());
    }

    #[test]
    fn test_future_timestamps_bounded() {
        let (guard, _) = guard();
        guard.check(NOW + 20_000, b"ahead").unwrap();
        assert!(guard.check(NOW + 40_000, b"far-ahead").is_err());
    }

    #[test]
    fn test_same_token_different_timestamp_is_duplicate() {
        let (guard, _) = guard();
        guard.check(NOW, b"token").unwrap();
        for timestamp in [NOW - 1, NOW + 1, NOW + 29_000] {
            assert!(matches!(
                guard.check(timestamp, b"token"),
                Err(Error::ReplayRejected(ReplayReason::Duplicate))
            ));
        }
    }

    #[test]
    fn test_relabelled_token_kept_until_first_seen_expires() {
        let (guard, clock) = guard();
        guard.check(NOW, b"token").unwrap();

        // Fresh timestamp after the original left the window.
        clock.advance(Duration::from_secs(34));
        guard.sweep().unwrap();
        assert!(matches!(
            guard.check(NOW + 34_000, b"token"),
            Err(Error::ReplayRejected(ReplayReason::Duplicate))
        ));

        clock.advance(Duration::from_millis(1_001));
        assert_eq!(guard.sweep().unwrap(), 1);
    }

    #[test]
    fn test_future_timestamp_outlives_first_seen() {
        let (guard, clock) = guard();
        guard.check(NOW + 30_000, b"ahead").unwrap();

        // First acceptance is past retention but the timestamp is not.
        clock.advance(Duration::from_secs(40));
        assert_eq!(guard.sweep().unwrap(), 0);
        assert!(matches!(
            guard.check(NOW + 40_000, b"ahead"),
            Err(Error::ReplayRejected(ReplayReason::Duplicate))
        ));
    }

    #[test]
    fn test_poisoned_state_is_reported() {
        let (guard, _) = guard();
        let _ = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _state = guard.state.lock().unwrap();
                    panic!("poison replay state");
                })
                .join()
        });

        assert!(matches!(guard.len(), Err(Error::Internal(_))));
        assert!(matches!(guard.check(NOW, b"n"), Err(Error::Internal(_))));
    }

    #[test]
    fn test_sweep_purges_only_outside_window() {
        let (guard, clock) = guard();
        guard.check(NOW, b"old").unwrap();
        clock.advance(Duration::from_secs(20));
        guard.check(NOW + 20_000, b"new").unwrap();

        // old is 35s + 1ms behind: outside window + grace.
        clock.advance(Duration::from_millis(15_001));
        assert_eq!(guard.sweep().unwrap(), 1);
        assert_eq!(guard.len().unwrap(), 1);

        // A purged pair is still rejected by the window check.
        assert!(guard.check(NOW, b"old").is_err());
    }

    #[test]
    fn test_opportunistic_sweep_every_n_checks() {
        let clock = ManualClock::new(NOW);
        let config = ReplayConfig {
            sweep_every: 3,
            ..ReplayConfig::default()
        };
        let guard = ReplayGuard::with_clock(config, Arc::new(clock.clone()));

        guard.check(NOW, b"a").unwrap();
        guard.check(NOW, b"b").unwrap();
        clock.advance(Duration::from_secs(36));

        // Third check sweeps a and b before inserting c.
        guard.check(NOW + 36_000, b"c").unwrap();
        assert_eq!(guard.len().unwrap(), 1);
    }

    #[test]
    fn test_time_based_sweep() {
        let (guard, clock) = guard();
        guard.check(NOW, b"a").unwrap();

        clock.advance(Duration::from_secs(61));
        guard.check(NOW + 61_000, b"b").unwrap();
        assert_eq!(guard.len().unwrap(), 1);
    }
}
