//! Batch isolation through the engine.

use std::sync::Arc;
use wb_core::{BatchConfig, Engine, EngineConfig, Error, FailureScope, WireEnvelope};
use wb_keys::mock::{ManualClock, MockKeyProvider};

const NOW: u64 = 1_700_000_000_000;

fn engine(parallel_threshold: usize) -> Engine {
    Engine::with_clock(
        EngineConfig {
            batch: BatchConfig {
                parallel_threshold,
                ..BatchConfig::default()
            },
            ..EngineConfig::default()
        },
        Arc::new(MockKeyProvider::new_deterministic()),
        Arc::new(ManualClock::new(NOW)),
    )
    .unwrap()
}

fn corrupt(envelope: &WireEnvelope) -> WireEnvelope {
    let mut bytes = envelope.to_bytes();
    bytes[24] ^= 0x01;
    WireEnvelope::from_bytes(&bytes, envelope.key_id(), envelope.timestamp()).unwrap()
}

/// [valid, corrupt, valid2] yields two successes and one isolated failure.
#[test]
fn test_batch_isolation() {
    let engine = engine(64);
    let mut envelopes = engine
        .seal_batch(&["valid", "corrupt", "valid2"], None)
        .unwrap();
    envelopes[1] = corrupt(&envelopes[1]);

    let outcome = engine.open_batch(&envelopes, None);
    assert_eq!(outcome.success_count(), 2);

    let failures: Vec<&Error> = outcome.failures().collect();
    assert_eq!(failures.len(), 1);
    match failures[0] {
        Error::BatchItemFailed { index, source } => {
            assert_eq!(*index, 1);
            assert!(matches!(**source, Error::AuthenticationFailed));
        }
        other => panic!("Expected BatchItemFailed, got {:?}", other),
    }
    assert_eq!(failures[0].scope(), FailureScope::Message);

    let results = outcome.into_results();
    assert_eq!(&results[0].as_ref().unwrap()[..], b"valid");
    assert_eq!(&results[2].as_ref().unwrap()[..], b"valid2");
}

/// A duplicate inside a batch fails only the second copy.
#[test]
fn test_batch_duplicate_is_isolated() {
    let engine = engine(64);
    let envelopes = engine.seal_batch(&["a", "b"], None).unwrap();
    let with_dup = vec![envelopes[0].clone(), envelopes[1].clone(), envelopes[0].clone()];

    let results = engine.open_batch(&with_dup, None).into_results();
    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    assert!(results[2].as_ref().unwrap_err().is_replay());
}

/// Large batches go through worker threads and keep their order.
#[test]
fn test_parallel_batch_keeps_order() {
    let engine = engine(4);
    let inputs: Vec<String> = (0..200).map(|i| format!("record {}", i)).collect();

    let mut envelopes = engine.seal_batch(&inputs, None).unwrap();
    for index in [3, 77, 150] {
        envelopes[index] = corrupt(&envelopes[index]);
    }

    let results = engine.open_batch(&envelopes, None).into_results();
    assert_eq!(results.len(), 200);
    for (i, result) in results.iter().enumerate() {
        match result {
            Ok(plaintext) => assert_eq!(&plaintext[..], inputs[i].as_bytes()),
            Err(Error::BatchItemFailed { index, .. }) => {
                assert!([3, 77, 150].contains(index));
                assert_eq!(*index, i);
            }
            Err(other) => panic!("unexpected {:?}", other),
        }
    }
}

/// Session envelopes without a session fail every item with batch scope.
#[test]
fn test_missing_session_is_batch_scoped() {
    let engine = engine(64);
    let client = wb_core::ClientHandshake::new(NOW).unwrap();
    let session = engine.accept_handshake(&client.request()).unwrap();
    let envelopes = engine.seal_batch(&["x", "y"], Some(&session)).unwrap();

    let outcome = engine.open_batch(&envelopes, None);
    assert_eq!(outcome.success_count(), 0);
    assert!(outcome.failures().all(|e| e.scope() == FailureScope::Batch));
}
