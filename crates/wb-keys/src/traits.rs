//! Key provider abstraction.
//!
//! The envelope codec and the session deriver only ever see keys through this
//! trait, so an env-backed store, a generated development store and a custom
//! injected provider are interchangeable.

use crate::error::Result;
use crate::record::{KeyAlgorithm, KeyRecord};
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

/// Source of key records.
///
/// Implementations:
/// - `KeyStore`: rotating multi-key store seeded from a master key
/// - `MockKeyProvider`: fixed records for tests
/// - Any caller-supplied provider (HSM, KMS, ...) via `ProviderKind::Custom`
///
/// # Requirements
///
/// - Must be safe to call from many threads concurrently
/// - Returned records are immutable snapshots; a concurrent rotation never
///   changes a record a caller already holds
/// - A record must stay resolvable through `get_key` for at least the replay
///   window after it stops being current
pub trait KeyProvider: Send + Sync {
    /// Returns the record new envelopes are sealed under.
    ///
    /// # Errors
    ///
    /// - `Error::KeyUnavailable` if no key has been initialized and none can
    ///   be created from configured material
    ///
    /// # Example
    ///
    /// ```
    /// use wb_keys::mock::MockKeyProvider;
    /// use wb_keys::KeyProvider;
    ///
    /// let provider = MockKeyProvider::new_deterministic();
    /// let record = provider.current_key().unwrap();
    /// assert_eq!(record.id(), "mock-0");
    /// ```
    fn current_key(&self) -> Result<Arc<KeyRecord>>;

    /// Resolves a record by id. Returns `Ok(None)` for unknown or evicted ids.
    fn get_key(&self, id: &str) -> Result<Option<Arc<KeyRecord>>>;

    /// How long a retired record stays resolvable through `get_key`.
    ///
    /// `None` when records are never retired (fixed or externally managed
    /// keys). Callers accepting envelopes up to a replay window check that
    /// this covers it.
    fn retention(&self) -> Option<Duration> {
        None
    }

    /// Retires the current record and installs a freshly generated one.
    ///
    /// Returns the new current record.
    ///
    /// # Errors
    ///
    /// - `Error::Unsupported` if the provider cannot generate keys
    fn rotate_keys(&self) -> Result<Arc<KeyRecord>>;

    /// Registers caller-supplied key material and returns the new record.
    ///
    /// `expires_at` defaults to the provider's key validity period.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidKeyMaterial` if the material length does not match the
    ///   algorithm
    /// - `Error::InvalidExpiry` if `expires_at` is not in the future
    fn store_key(
        &self,
        material: Zeroizing<Vec<u8>>,
        algorithm: KeyAlgorithm,
        expires_at: Option<u64>,
    ) -> Result<Arc<KeyRecord>>;
}
