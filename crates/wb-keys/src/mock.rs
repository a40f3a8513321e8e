//! Mock implementations for testing.
//!
//! Provides deterministic, reproducible behavior for automated CI testing.

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::record::{KeyAlgorithm, KeyRecord};
use crate::traits::KeyProvider;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use wb_crypto::kex::X25519KeyPair;
use zeroize::Zeroizing;

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can keep a handle while a store or
/// guard owns another.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use wb_keys::mock::ManualClock;
/// use wb_keys::Clock;
///
/// let clock = ManualClock::new(1_000);
/// clock.advance(Duration::from_secs(2));
/// assert_eq!(clock.now_ms(), 3_000);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock reading `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(now_ms)),
        }
    }

    /// Sets the current time.
    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    /// Moves the clock backward.
    pub fn rewind(&self, by: Duration) {
        self.now.fetch_sub(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Mock key provider for testing.
///
/// Serves a fixed X25519 record with id `mock-0` and never rotates.
///
/// # Example
///
/// ```
/// use wb_keys::mock::MockKeyProvider;
/// use wb_keys::KeyProvider;
///
/// let provider1 = MockKeyProvider::new_deterministic();
/// let provider2 = MockKeyProvider::new_deterministic();
/// let key1 = provider1.current_key().unwrap();
/// let key2 = provider2.current_key().unwrap();
/// assert_eq!(key1.public_key(), key2.public_key()); // Deterministic
/// ```
#[derive(Clone)]
pub struct MockKeyProvider {
    private: Arc<Zeroizing<[u8; 32]>>,
    stored: Arc<RwLock<HashMap<String, Arc<KeyRecord>>>>,
    sequence: Arc<AtomicU64>,
}

impl MockKeyProvider {
    /// Creates a mock provider with a deterministic keypair.
    ///
    /// The private scalar is fixed for reproducible tests. All instances
    /// created with this method serve the same key.
    pub fn new_deterministic() -> Self {
        Self::with_private([0x42u8; 32])
    }

    /// Creates a mock provider with a random keypair.
    ///
    /// Useful for tests that need unique keys per instance.
    pub fn new_random() -> Self {
        let mut private = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut private);
        Self::with_private(private)
    }

    /// Creates a mock provider from a specific private scalar.
    ///
    /// Useful for test vectors that specify exact keys.
    pub fn with_private(private: [u8; 32]) -> Self {
        Self {
            private: Arc::new(Zeroizing::new(private)),
            stored: Arc::new(RwLock::new(HashMap::new())),
            sequence: Arc::new(AtomicU64::new(1)),
        }
    }

    fn current_record(&self) -> Result<KeyRecord> {
        let keypair = X25519KeyPair::from_private(**self.private)?;
        KeyRecord::from_keypair("mock-0", &keypair, 0, None)
    }
}

impl KeyProvider for MockKeyProvider {
    fn current_key(&self) -> Result<Arc<KeyRecord>> {
        Ok(Arc::new(self.current_record()?))
    }

    fn get_key(&self, id: &str) -> Result<Option<Arc<KeyRecord>>> {
        if id == "mock-0" {
            return self.current_key().map(Some);
        }
        let stored = self
            .stored
            .read()
            .map_err(|_| Error::Keystore("mock key map lock poisoned".into()))?;
        Ok(stored.get(id).cloned())
    }

    fn rotate_keys(&self) -> Result<Arc<KeyRecord>> {
        Err(Error::Unsupported("mock provider does not rotate".into()))
    }

    fn store_key(
        &self,
        material: Zeroizing<Vec<u8>>,
        algorithm: KeyAlgorithm,
        expires_at: Option<u64>,
    ) -> Result<Arc<KeyRecord>> {
        let id = format!("mock-{}", self.sequence.fetch_add(1, Ordering::Relaxed));
        let record = Arc::new(KeyRecord::new(id, algorithm, material, 0, expires_at)?);

        self.stored
            .write()
            .map_err(|_| Error::Keystore("mock key map lock poisoned".into()))?
            .insert(record.id().to_string(), record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(10);
        let handle = clock.clone();

        handle.advance(Duration::from_millis(5));
        assert_eq!(clock.now_ms(), 15);

        clock.rewind(Duration::from_millis(10));
        assert_eq!(handle.now_ms(), 5);

        clock.set(99);
        assert_eq!(handle.now_ms(), 99);
    }

    #[test]
    fn test_mock_key_provider_random() {
        let key1 = MockKeyProvider::new_random().current_key().unwrap();
        let key2 = MockKeyProvider::new_random().current_key().unwrap();

        assert_ne!(key1.public_key(), key2.public_key(), "Random keys should differ");
    }

    #[test]
    fn test_mock_key_provider_with_private() {
        let provider = MockKeyProvider::with_private([0x99u8; 32]);
        let expected = X25519KeyPair::from_private([0x99u8; 32]).unwrap();

        let key = provider.current_key().unwrap();
        assert_eq!(key.public_key().unwrap(), *expected.public_key());
    }

    #[test]
    fn test_mock_key_provider_does_not_rotate() {
        let provider = MockKeyProvider::new_deterministic();
        assert!(matches!(provider.rotate_keys(), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_mock_key_provider_store_and_get() {
        let provider = MockKeyProvider::new_deterministic();
        let stored = provider
            .store_key(
                Zeroizing::new(vec![1u8; 32]),
                KeyAlgorithm::XChaCha20Poly1305,
                None,
            )
            .unwrap();

        assert_eq!(stored.id(), "mock-1");
        assert!(provider.get_key("mock-1").unwrap().is_some());
        assert!(provider.get_key("mock-0").unwrap().is_some());
        assert!(provider.get_key("mock-2").unwrap().is_none());
        assert_eq!(provider.current_key().unwrap().id(), "mock-0");
    }

    #[test]
    fn test_mock_key_provider_poisoned_map_is_an_error() {
        let provider = MockKeyProvider::new_deterministic();
        let stored = Arc::clone(&provider.stored);
        let _ = std::thread::spawn(move || {
            let _guard = stored.write().unwrap();
            panic!("poison key map");
        })
        .join();

        assert!(matches!(provider.get_key("mock-1"), Err(Error::Keystore(_))));
        assert!(matches!(
            provider.store_key(
                Zeroizing::new(vec![1u8; 32]),
                KeyAlgorithm::XChaCha20Poly1305,
                None,
            ),
            Err(Error::Keystore(_))
        ));
        // The fixed record does not touch the map.
        assert!(provider.get_key("mock-0").unwrap().is_some());
    }
}
