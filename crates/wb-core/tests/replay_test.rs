//! Replay window and concurrent duplicate tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use wb_core::{Engine, EngineConfig, Error, ReplayConfig, ReplayGuard, ReplayReason, WireEnvelope};
use wb_keys::mock::{ManualClock, MockKeyProvider};
use wb_keys::Clock;

const NOW: u64 = 1_700_000_000_000;

fn guard(window_ms: u64) -> (Arc<ReplayGuard>, ManualClock) {
    let clock = ManualClock::new(NOW);
    let config = ReplayConfig {
        window: Duration::from_millis(window_ms),
        ..ReplayConfig::default()
    };
    (
        Arc::new(ReplayGuard::with_clock(config, Arc::new(clock.clone()))),
        clock,
    )
}

// ============================================================================
// Window
// ============================================================================

/// At window 30000: (now, n) accepted once, now-40000 rejected, now-20000 accepted.
#[test]
fn test_replay_window_30s() {
    let (guard, _) = guard(30_000);
    let nonce = [7u8; 24];

    guard.check(NOW, &nonce).unwrap();
    assert!(matches!(
        guard.check(NOW, &nonce),
        Err(Error::ReplayRejected(ReplayReason::Duplicate))
    ));

    assert!(matches!(
        guard.check(NOW - 40_000, &[1u8; 24]),
        Err(Error::ReplayRejected(ReplayReason::OutsideWindow { .. }))
    ));
    guard.check(NOW - 20_000, &[2u8; 24]).unwrap();
}

/// Once an accepted message ages out, it is rejected by the window check
/// whether or not its entry was swept.
#[test]
fn test_aged_message_stays_rejected() {
    let (guard, clock) = guard(30_000);
    guard.check(NOW, b"token").unwrap();

    clock.advance(Duration::from_secs(31));
    assert!(guard.check(NOW, b"token").is_err());

    clock.advance(Duration::from_secs(3600));
    guard.sweep().unwrap();
    assert!(guard.is_empty().unwrap());
    assert!(guard.check(NOW, b"token").is_err());
}

// ============================================================================
// Relabelled timestamps
// ============================================================================

fn engine_at(config: EngineConfig) -> (Engine, ManualClock) {
    let clock = ManualClock::new(NOW);
    let engine = Engine::with_clock(
        config,
        Arc::new(MockKeyProvider::new_deterministic()),
        Arc::new(clock.clone()),
    )
    .unwrap();
    (engine, clock)
}

fn relabel(envelope: &WireEnvelope, timestamp: u64) -> WireEnvelope {
    WireEnvelope::new(
        envelope.nonce(),
        envelope.ciphertext().to_vec(),
        envelope.key_id(),
        timestamp,
    )
    .unwrap()
}

/// With default settings `ts` is authenticated: a captured envelope carrying a
/// new timestamp no longer opens, before or after the original ages out.
#[test]
fn test_relabelled_timestamp_fails_authentication() {
    let (engine, clock) = engine_at(EngineConfig::default());
    let envelope = engine.seal(b"transfer", None).unwrap();
    engine.open(&envelope, None).unwrap();

    assert!(matches!(
        engine.open(&relabel(&envelope, NOW + 1), None),
        Err(Error::AuthenticationFailed)
    ));

    clock.advance(Duration::from_secs(3600));
    assert!(matches!(
        engine.open(&relabel(&envelope, clock.now_ms()), None),
        Err(Error::AuthenticationFailed)
    ));
}

/// Without binding the relabelled envelope decrypts, and the nonce alone
/// identifies it as a duplicate.
#[test]
fn test_relabelled_timestamp_unbound_is_duplicate() {
    let (engine, clock) = engine_at(EngineConfig {
        bind_metadata: false,
        ..EngineConfig::default()
    });
    let envelope = engine.seal(b"transfer", None).unwrap();
    engine.open(&envelope, None).unwrap();

    assert!(matches!(
        engine.open(&relabel(&envelope, NOW + 1), None),
        Err(Error::ReplayRejected(ReplayReason::Duplicate))
    ));

    clock.advance(Duration::from_secs(20));
    assert!(matches!(
        engine.open(&relabel(&envelope, clock.now_ms()), None),
        Err(Error::ReplayRejected(ReplayReason::Duplicate))
    ));
}

// ============================================================================
// Concurrency
// ============================================================================

/// Many threads racing with the same (timestamp, token): exactly one wins.
#[test]
fn test_concurrent_duplicates_accepted_once() {
    let (guard, clock) = guard(30_000);
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));
    let accepted = Arc::new(AtomicUsize::new(0));
    let ts = clock.now_ms();

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let guard = Arc::clone(&guard);
            let barrier = Arc::clone(&barrier);
            let accepted = Arc::clone(&accepted);
            thread::spawn(move || {
                barrier.wait();
                if guard.check(ts, b"same-nonce").is_ok() {
                    accepted.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}

/// The same envelope opened concurrently through the engine decrypts once.
#[test]
fn test_concurrent_engine_open_accepts_once() {
    let clock = ManualClock::new(NOW);
    let engine = Arc::new(
        Engine::with_clock(
            EngineConfig::default(),
            Arc::new(MockKeyProvider::new_deterministic()),
            Arc::new(clock),
        )
        .unwrap(),
    );
    let envelope = Arc::new(engine.seal(b"once", None).unwrap());

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let envelope = Arc::clone(&envelope);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                engine.open(&envelope, None).is_ok()
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);
}
