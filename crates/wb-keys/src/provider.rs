//! Key provider selection.
//!
//! The provider is chosen once at startup from an explicit variant rather than
//! looked up by name at request time.

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::store::{KeyStore, KeyStoreConfig};
use crate::traits::KeyProvider;
use std::fmt;
use std::sync::Arc;

/// Provider variants.
#[derive(Clone)]
pub enum ProviderKind {
    /// Rotating store seeded from a configured master key (see
    /// `KeyStoreConfig::from_env`). A missing master key is an error.
    Env(KeyStoreConfig),
    /// Rotating store seeded with a freshly generated keypair. Keys do not
    /// survive a restart; intended for development and tests.
    Generated(KeyStoreConfig),
    /// Caller-supplied provider (HSM, KMS, ...).
    Custom(Arc<dyn KeyProvider>),
}

impl fmt::Debug for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env(config) => f.debug_tuple("Env").field(config).finish(),
            Self::Generated(config) => f.debug_tuple("Generated").field(config).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Resolve a provider on the system clock.
///
/// # Errors
///
/// - `Error::Config` if `ProviderKind::Env` has no master key
pub fn select_provider(kind: ProviderKind) -> Result<Arc<dyn KeyProvider>> {
    select_provider_with_clock(kind, Arc::new(SystemClock))
}

/// Resolve a provider on an explicit clock.
pub fn select_provider_with_clock(
    kind: ProviderKind,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn KeyProvider>> {
    match kind {
        ProviderKind::Env(config) => {
            if config.master_key.is_none() {
                return Err(Error::Config(format!(
                    "env key provider requires {}",
                    crate::env::MASTER_KEY_VAR
                )));
            }
            tracing::info!("Using env key provider");
            Ok(Arc::new(KeyStore::with_clock(config, clock)?))
        }
        ProviderKind::Generated(config) => {
            tracing::warn!("Using generated key provider; keys will not survive a restart");
            Ok(Arc::new(KeyStore::generated(config, clock)?))
        }
        ProviderKind::Custom(provider) => {
            tracing::info!("Using custom key provider");
            Ok(provider)
        }
    }
}
