//! Key lifecycle errors.

use thiserror::Error;

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;

/// Key lifecycle errors.
#[derive(Debug, Error)]
pub enum Error {
    /// No usable key is available.
    #[error("Key unavailable: {0}")]
    KeyUnavailable(String),

    /// Master key failed validation at load time.
    #[error("Invalid master key: {0}")]
    InvalidMasterKey(String),

    /// Key material length does not match its algorithm.
    #[error("Invalid key material for {algorithm}: expected {expected} bytes, got {actual}")]
    InvalidKeyMaterial {
        /// Declared algorithm name.
        algorithm: &'static str,
        /// Required length in bytes.
        expected: usize,
        /// Supplied length in bytes.
        actual: usize,
    },

    /// Expiry is not strictly after creation.
    #[error("Invalid expiry: expires_at {expires_at} is not after created_at {created_at}")]
    InvalidExpiry {
        /// Creation time (ms since epoch).
        created_at: u64,
        /// Requested expiry (ms since epoch).
        expires_at: u64,
    },

    /// Algorithm name is unknown to this build.
    #[error("Unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Operation not supported by this provider.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Keystore state error.
    #[error("Keystore error: {0}")]
    Keystore(String),

    /// Cryptographic error.
    #[error("Crypto error: {0}")]
    Crypto(#[from] wb_crypto::Error),
}
