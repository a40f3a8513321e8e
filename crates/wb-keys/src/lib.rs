//! Key lifecycle management for the wirebox protocol.
//!
//! Implements:
//! - Immutable key records with algorithm-checked material
//! - The `KeyProvider` contract (current key, lookup, rotation, registration)
//! - A rotating multi-key `KeyStore` with copy-on-write "current" pointer
//! - Strict master key loading from the environment
//! - Provider selection at startup (env-backed, generated, custom-injected)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod env;
pub mod error;
pub mod mock;
pub mod provider;
pub mod record;
pub mod store;
pub mod traits;

pub use clock::{Clock, SystemClock};
pub use env::MasterKey;
pub use error::{Error, Result};
pub use provider::{select_provider, ProviderKind};
pub use record::{KeyAlgorithm, KeyRecord};
pub use store::{KeyStore, KeyStoreConfig};
pub use traits::KeyProvider;
