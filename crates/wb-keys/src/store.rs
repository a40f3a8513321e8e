//! Rotating multi-key store.
//!
//! Holds every record that may still be referenced by an envelope in flight.
//! Readers take a brief read lock and clone an `Arc<KeyRecord>`; rotation builds
//! the new record outside the lock and swaps the "current" pointer under the
//! write lock.
//!
//! Retired records stay resolvable through `get_key` for
//! `replay_window + retention_grace` after they stop being current. Eviction
//! runs whenever the store is mutated.

use crate::clock::{Clock, SystemClock};
use crate::env::MasterKey;
use crate::error::{Error, Result};
use crate::record::{KeyAlgorithm, KeyRecord};
use crate::traits::KeyProvider;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use wb_crypto::kex::X25519KeyPair;
use zeroize::Zeroizing;

/// Key store configuration.
#[derive(Debug, Clone)]
pub struct KeyStoreConfig {
    /// Lifetime of a generated or registered key (rotation interval).
    pub key_validity: Duration,
    /// Extra retention for retired keys beyond the replay window.
    pub retention_grace: Duration,
    /// Replay/freshness window envelopes are accepted within.
    pub replay_window: Duration,
    /// Long-term keypair the store is seeded with.
    pub master_key: Option<MasterKey>,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            key_validity: Duration::from_secs(7 * 24 * 60 * 60),
            retention_grace: Duration::from_secs(24 * 60 * 60),
            replay_window: Duration::from_secs(30),
            master_key: None,
        }
    }
}

impl KeyStoreConfig {
    /// How long a retired record stays resolvable.
    pub fn retention(&self) -> Duration {
        self.replay_window + self.retention_grace
    }
}

struct KeySlot {
    record: Arc<KeyRecord>,
    retired_at: Option<u64>,
}

#[derive(Default)]
struct KeyState {
    slots: HashMap<String, KeySlot>,
    current: Option<Arc<KeyRecord>>,
}

/// Rotating key store.
///
/// # Example
///
/// ```
/// use wb_keys::{KeyProvider, KeyStore, KeyStoreConfig, MasterKey};
///
/// let config = KeyStoreConfig {
///     master_key: Some(MasterKey::generate().unwrap()),
///     ..KeyStoreConfig::default()
/// };
/// let store = KeyStore::new(config).unwrap();
///
/// let first = store.current_key().unwrap();
/// let second = store.rotate_keys().unwrap();
/// assert_ne!(first.id(), second.id());
/// assert!(store.get_key(first.id()).unwrap().is_some());
/// ```
pub struct KeyStore {
    config: KeyStoreConfig,
    clock: Arc<dyn Clock>,
    state: RwLock<KeyState>,
    sequence: AtomicU64,
}

impl KeyStore {
    /// Create a store on the system clock.
    ///
    /// If `config.master_key` is set it becomes the current record.
    pub fn new(config: KeyStoreConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a store on an explicit clock.
    pub fn with_clock(config: KeyStoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = Self {
            config,
            clock,
            state: RwLock::new(KeyState::default()),
            sequence: AtomicU64::new(0),
        };

        if let Some(master) = store.config.master_key.clone() {
            let now = store.clock.now_ms();
            let mut state = store.write()?;
            store.install_master(&mut state, &master, now)?;
        }

        Ok(store)
    }

    /// Create a store seeded with a freshly generated keypair.
    pub fn generated(config: KeyStoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = Self::with_clock(config, clock)?;
        if store.read()?.current.is_none() {
            store.rotate_keys()?;
        }
        Ok(store)
    }

    /// Store configuration.
    pub fn config(&self) -> &KeyStoreConfig {
        &self.config
    }

    /// Number of records currently resolvable.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.slots.len())
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Evict retired and expired records past their retention period.
    ///
    /// Returns the number of records removed.
    pub fn evict_expired(&self) -> Result<usize> {
        let now = self.clock.now_ms();
        let mut state = self.write()?;
        Ok(self.evict(&mut state, now))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, KeyState>> {
        self.state
            .read()
            .map_err(|_| Error::Keystore("key state lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, KeyState>> {
        self.state
            .write()
            .map_err(|_| Error::Keystore("key state lock poisoned".into()))
    }

    fn next_id(&self, prefix: &str, now: u64) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}-{}", prefix, now, seq)
    }

    fn expiry_from(&self, now: u64) -> u64 {
        now.saturating_add(self.config.key_validity.as_millis() as u64)
    }

    fn install_master(
        &self,
        state: &mut KeyState,
        master: &MasterKey,
        now: u64,
    ) -> Result<Arc<KeyRecord>> {
        let record = Arc::new(KeyRecord::new(
            self.next_id("env", now),
            KeyAlgorithm::X25519,
            Zeroizing::new(master.as_bytes().to_vec()),
            now,
            Some(self.expiry_from(now)),
        )?);

        tracing::info!("Loaded master key {}", record.id());
        self.make_current(state, record.clone(), now);
        Ok(record)
    }

    fn install_generated(&self, state: &mut KeyState, now: u64) -> Result<Arc<KeyRecord>> {
        let keypair = X25519KeyPair::generate()?;
        let record = Arc::new(KeyRecord::from_keypair(
            self.next_id("gen", now),
            &keypair,
            now,
            Some(self.expiry_from(now)),
        )?);

        let previous = state.current.as_ref().map(|r| r.id().to_string());
        self.make_current(state, record.clone(), now);
        let evicted = self.evict(state, now);

        tracing::info!(
            "Rotated keys: current={} previous={} evicted={}",
            record.id(),
            previous.as_deref().unwrap_or("none"),
            evicted
        );
        Ok(record)
    }

    fn make_current(&self, state: &mut KeyState, record: Arc<KeyRecord>, now: u64) {
        if let Some(previous) = state.current.take() {
            if let Some(slot) = state.slots.get_mut(previous.id()) {
                slot.retired_at = Some(now);
            }
        }

        state.slots.insert(
            record.id().to_string(),
            KeySlot {
                record: record.clone(),
                retired_at: None,
            },
        );
        state.current = Some(record);
    }

    fn evict(&self, state: &mut KeyState, now: u64) -> usize {
        let retention = self.config.retention().as_millis() as u64;
        let current_id = state.current.as_ref().map(|r| r.id().to_string());
        let before = state.slots.len();

        state.slots.retain(|id, slot| {
            if current_id.as_deref() == Some(id.as_str()) {
                return true;
            }
            match (slot.retired_at, slot.record.expires_at()) {
                (Some(retired_at), _) => now.saturating_sub(retired_at) <= retention,
                (None, Some(expires_at)) => now.saturating_sub(expires_at) <= retention,
                (None, None) => true,
            }
        });

        before - state.slots.len()
    }
}

impl KeyProvider for KeyStore {
    fn current_key(&self) -> Result<Arc<KeyRecord>> {
        let now = self.clock.now_ms();

        {
            let state = self.read()?;
            if let Some(record) = state.current.as_ref() {
                if !record.is_expired(now) {
                    return Ok(record.clone());
                }
            }
        }

        let mut state = self.write()?;
        match state.current.clone() {
            // Another caller rotated while we waited for the write lock.
            Some(record) if !record.is_expired(now) => Ok(record),
            Some(_) => self.install_generated(&mut state, now),
            None => match self.config.master_key.as_ref() {
                Some(master) => self.install_master(&mut state, master, now),
                None => Err(Error::KeyUnavailable(
                    "no key initialized and no master key configured".into(),
                )),
            },
        }
    }

    fn get_key(&self, id: &str) -> Result<Option<Arc<KeyRecord>>> {
        let state = self.read()?;
        Ok(state.slots.get(id).map(|slot| slot.record.clone()))
    }

    fn retention(&self) -> Option<Duration> {
        Some(self.config.retention())
    }

    fn rotate_keys(&self) -> Result<Arc<KeyRecord>> {
        let now = self.clock.now_ms();
        let mut state = self.write()?;
        self.install_generated(&mut state, now)
    }

    fn store_key(
        &self,
        material: Zeroizing<Vec<u8>>,
        algorithm: KeyAlgorithm,
        expires_at: Option<u64>,
    ) -> Result<Arc<KeyRecord>> {
        let now = self.clock.now_ms();
        let expires_at = expires_at.unwrap_or_else(|| self.expiry_from(now));
        let record = Arc::new(KeyRecord::new(
            self.next_id("custom", now),
            algorithm,
            material,
            now,
            Some(expires_at),
        )?);

        let mut state = self.write()?;
        state.slots.insert(
            record.id().to_string(),
            KeySlot {
                record: record.clone(),
                retired_at: None,
            },
        );
        self.evict(&mut state, now);

        tracing::info!("Stored {} key {}", algorithm, record.id());
        Ok(record)
    }
}
