//! Master key loading and environment configuration.
//!
//! The master key is a base64-encoded 64-byte X25519 keypair in the libsodium
//! layout (`private[32] || public[32]`). It is validated strictly at load time:
//! canonical base64, exact length, and a public half that belongs to the
//! private half. A malformed key is a startup error, never a runtime one.

use crate::error::{Error, Result};
use crate::store::KeyStoreConfig;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt;
use std::time::Duration;
use wb_crypto::kex::{X25519KeyPair, KEYPAIR_LEN};
use zeroize::Zeroizing;

/// Environment variable holding the base64 master keypair.
pub const MASTER_KEY_VAR: &str = "WIREBOX_MASTER_KEY";

/// Environment variable holding the rotation interval in seconds.
pub const ROTATION_INTERVAL_VAR: &str = "WIREBOX_ROTATION_INTERVAL_SECS";

/// Environment variable holding the replay window in ms.
///
/// Read by both the key store (retention) and the engine (replay guard) so the
/// two windows cannot drift apart.
pub const REPLAY_WINDOW_VAR: &str = "WIREBOX_REPLAY_WINDOW_MS";

/// Validated 64-byte master keypair.
#[derive(Clone)]
pub struct MasterKey(Zeroizing<[u8; KEYPAIR_LEN]>);

impl MasterKey {
    /// Decode and validate a base64 master key.
    ///
    /// Surrounding whitespace is ignored; anything else that is not canonical
    /// standard base64 is rejected.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidMasterKey` on bad encoding, wrong length or a
    /// mismatched public half.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| Error::InvalidMasterKey(format!("invalid base64: {}", e)))?,
        );
        Self::from_bytes(&decoded)
    }

    /// Validate a raw 64-byte keypair.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEYPAIR_LEN {
            return Err(Error::InvalidMasterKey(format!(
                "expected {} bytes, got {}",
                KEYPAIR_LEN,
                bytes.len()
            )));
        }

        let keypair = X25519KeyPair::from_keypair_bytes(bytes)
            .map_err(|e| Error::InvalidMasterKey(e.to_string()))?;
        Ok(Self(keypair.to_keypair_bytes()))
    }

    /// Build a master key from a private scalar.
    pub fn from_private(private: [u8; 32]) -> Result<Self> {
        let keypair = X25519KeyPair::from_private(private)?;
        Ok(Self(keypair.to_keypair_bytes()))
    }

    /// Generate a random master key.
    pub fn generate() -> Result<Self> {
        let keypair = X25519KeyPair::generate()?;
        Ok(Self(keypair.to_keypair_bytes()))
    }

    /// Encode as standard base64, the format `from_base64` accepts.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(&self.0[..]))
    }

    /// Public half.
    pub fn public_key(&self) -> [u8; 32] {
        let mut public = [0u8; 32];
        public.copy_from_slice(&self.0[32..]);
        public
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEYPAIR_LEN] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey")
            .field("public", &STANDARD.encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

impl KeyStoreConfig {
    /// Load configuration from the process environment.
    ///
    /// Reads `WIREBOX_MASTER_KEY`, `WIREBOX_ROTATION_INTERVAL_SECS` and
    /// `WIREBOX_REPLAY_WINDOW_MS`; unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(encoded) = lookup(MASTER_KEY_VAR) {
            config.master_key = Some(MasterKey::from_base64(&encoded)?);
        }

        if let Some(raw) = lookup(ROTATION_INTERVAL_VAR) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::Config(format!("{} must be an integer, got {:?}", ROTATION_INTERVAL_VAR, raw))
            })?;
            if secs == 0 {
                return Err(Error::Config(format!("{} must be positive", ROTATION_INTERVAL_VAR)));
            }
            config.key_validity = Duration::from_secs(secs);
        }

        if let Some(window) = replay_window_from(&lookup)? {
            config.replay_window = window;
        }

        tracing::debug!(
            "Key store config: master_key={} key_validity={:?} replay_window={:?}",
            config.master_key.is_some(),
            config.key_validity,
            config.replay_window
        );
        Ok(config)
    }
}

/// Parse `WIREBOX_REPLAY_WINDOW_MS` through `lookup`, if set.
///
/// # Errors
///
/// Returns `Error::Config` if the value is not a non-negative integer.
pub fn replay_window_from<F>(lookup: F) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(REPLAY_WINDOW_VAR)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| Error::Config(format!("invalid {}: {:?}", REPLAY_WINDOW_VAR, raw)))
        })
        .transpose()
}
