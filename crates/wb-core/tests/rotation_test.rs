//! Rotation continuity through the engine.

use std::sync::Arc;
use std::time::Duration;
use wb_core::{Engine, EngineConfig, Error, ReplayConfig};
use wb_keys::env::{MASTER_KEY_VAR, REPLAY_WINDOW_VAR};
use wb_keys::mock::ManualClock;
use wb_keys::{KeyProvider, KeyStore, KeyStoreConfig, MasterKey};

const T0: u64 = 1_700_000_000_000;

fn setup() -> (Engine, Arc<KeyStore>, ManualClock) {
    let clock = ManualClock::new(T0);
    let store = Arc::new(
        KeyStore::with_clock(
            KeyStoreConfig {
                master_key: Some(MasterKey::from_private([0x77u8; 32]).unwrap()),
                replay_window: Duration::from_secs(30),
                retention_grace: Duration::from_secs(60),
                ..KeyStoreConfig::default()
            },
            Arc::new(clock.clone()),
        )
        .unwrap(),
    );

    // Replay window as wide as the store's retention (30s + 60s).
    let config = EngineConfig {
        replay: ReplayConfig {
            window: Duration::from_secs(90),
            ..ReplayConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = Engine::with_clock(config, store.clone(), Arc::new(clock.clone())).unwrap();
    (engine, store, clock)
}

/// An envelope sealed before rotation opens through `get_key(oldId)` during
/// the grace period and fails once the old key is evicted.
#[test]
fn test_old_envelopes_open_through_grace_period() {
    let (engine, store, clock) = setup();

    let before = engine.seal(b"sealed before rotation", None).unwrap();
    let old_id = before.key_id().to_string();

    let rotated = engine.rotate_keys().unwrap();
    assert_ne!(rotated.kid, old_id);

    clock.advance(Duration::from_secs(60));
    let after = engine.seal(b"sealed after rotation", None).unwrap();
    assert_eq!(after.key_id(), rotated.kid);

    clock.advance(Duration::from_secs(29));
    assert!(store.get_key(&old_id).unwrap().is_some());
    assert_eq!(
        &engine.open(&before, None).unwrap()[..],
        b"sealed before rotation"
    );

    clock.advance(Duration::from_secs(2));
    store.evict_expired().unwrap();
    let late = engine.seal(b"late", None).unwrap();
    assert!(matches!(
        engine.open(&before, None),
        Err(Error::UnknownKeyId(_))
    ));
    assert_eq!(&engine.open(&after, None).unwrap()[..], b"sealed after rotation");
    assert_eq!(&engine.open(&late, None).unwrap()[..], b"late");
}

/// A previously unseen envelope under an evicted key is an unknown key id.
#[test]
fn test_evicted_key_is_unknown() {
    let (engine, store, clock) = setup();

    let before = engine.seal(b"x", None).unwrap();
    engine.rotate_keys().unwrap();

    clock.advance(Duration::from_secs(91));
    store.evict_expired().unwrap();

    let err = engine.open(&before, None).unwrap_err();
    assert!(matches!(err, Error::UnknownKeyId(_)));
}

/// The exposed public key follows rotation.
#[test]
fn test_public_key_follows_rotation() {
    let (engine, _store, _clock) = setup();
    let first = engine.public_key().unwrap();
    let second = engine.rotate_keys().unwrap();

    assert_ne!(first.kid, second.kid);
    assert_ne!(first.public, second.public);
    assert_eq!(engine.public_key().unwrap(), second);
}

/// A replay window wider than the store's retention would accept envelopes
/// whose key is already gone, so the engine refuses to start.
#[test]
fn test_replay_window_must_fit_retention() {
    let clock = ManualClock::new(T0);
    let store = Arc::new(
        KeyStore::with_clock(
            KeyStoreConfig {
                master_key: Some(MasterKey::from_private([0x77u8; 32]).unwrap()),
                replay_window: Duration::from_secs(30),
                retention_grace: Duration::from_secs(60),
                ..KeyStoreConfig::default()
            },
            Arc::new(clock.clone()),
        )
        .unwrap(),
    );
    let config = EngineConfig {
        replay: ReplayConfig {
            window: Duration::from_secs(91),
            ..ReplayConfig::default()
        },
        ..EngineConfig::default()
    };

    let result = Engine::with_clock(config, store, Arc::new(clock));
    assert!(matches!(result, Err(Error::Config(_))));
}

/// One variable configures both the store's retention and the engine's window.
#[test]
fn test_replay_window_variable_drives_both_sides() {
    let master = MasterKey::from_private([0x77u8; 32]).unwrap();
    let vars = move |name: &str| match name {
        REPLAY_WINDOW_VAR => Some("120000".to_string()),
        MASTER_KEY_VAR => Some(master.to_base64().to_string()),
        _ => None,
    };

    let store_config = KeyStoreConfig::from_lookup(&vars).unwrap();
    let engine_config = EngineConfig::from_lookup(&vars).unwrap();
    assert_eq!(store_config.replay_window, Duration::from_secs(120));
    assert_eq!(engine_config.replay.window, Duration::from_secs(120));

    let clock = ManualClock::new(T0);
    let store = Arc::new(KeyStore::with_clock(store_config, Arc::new(clock.clone())).unwrap());
    assert!(Engine::with_clock(engine_config, store, Arc::new(clock)).is_ok());
}
