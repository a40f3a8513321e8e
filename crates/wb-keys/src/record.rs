//! Key records.
//!
//! A `KeyRecord` is immutable once created. Rotation never mutates a record in
//! place; the store swaps its "current" pointer to a new `Arc<KeyRecord>`.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;
use wb_crypto::kdf::derive_static_key;
use wb_crypto::kex::X25519KeyPair;
use zeroize::Zeroizing;

/// Algorithm a key record's material belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    /// X25519 keypair, libsodium layout `private[32] || public[32]`.
    X25519,
    /// Raw 32-byte XChaCha20-Poly1305 key.
    XChaCha20Poly1305,
    /// Raw 32-byte XSalsa20-Poly1305 (secretbox) key.
    XSalsa20Poly1305,
}

impl KeyAlgorithm {
    /// Required material length in bytes.
    pub fn key_len(&self) -> usize {
        match self {
            Self::X25519 => 64,
            Self::XChaCha20Poly1305 | Self::XSalsa20Poly1305 => 32,
        }
    }

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::X25519 => "X25519",
            Self::XChaCha20Poly1305 => "XChaCha20-Poly1305",
            Self::XSalsa20Poly1305 => "XSalsa20-Poly1305",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [Self::X25519, Self::XChaCha20Poly1305, Self::XSalsa20Poly1305]
            .into_iter()
            .find(|alg| alg.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnsupportedAlgorithm(s.to_string()))
    }
}

/// An identified, immutable unit of key material.
///
/// Key material is zeroed on drop and never printed by `Debug`.
#[derive(Clone)]
pub struct KeyRecord {
    id: String,
    algorithm: KeyAlgorithm,
    material: Zeroizing<Vec<u8>>,
    created_at: u64,
    expires_at: Option<u64>,
}

impl KeyRecord {
    /// Create a record, validating material length and expiry.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidKeyMaterial` if the material length does not match
    ///   `algorithm.key_len()`
    /// - `Error::InvalidExpiry` if `expires_at` is not after `created_at`
    /// - `Error::Crypto` if an X25519 keypair's public half does not belong to
    ///   its private half
    pub fn new(
        id: impl Into<String>,
        algorithm: KeyAlgorithm,
        material: Zeroizing<Vec<u8>>,
        created_at: u64,
        expires_at: Option<u64>,
    ) -> Result<Self> {
        if material.len() != algorithm.key_len() {
            return Err(Error::InvalidKeyMaterial {
                algorithm: algorithm.name(),
                expected: algorithm.key_len(),
                actual: material.len(),
            });
        }

        if let Some(expires_at) = expires_at {
            if expires_at <= created_at {
                return Err(Error::InvalidExpiry {
                    created_at,
                    expires_at,
                });
            }
        }

        if algorithm == KeyAlgorithm::X25519 {
            X25519KeyPair::from_keypair_bytes(&material)?;
        }

        Ok(Self {
            id: id.into(),
            algorithm,
            material,
            created_at,
            expires_at,
        })
    }

    /// Create an X25519 record from a keypair.
    pub fn from_keypair(
        id: impl Into<String>,
        keypair: &X25519KeyPair,
        created_at: u64,
        expires_at: Option<u64>,
    ) -> Result<Self> {
        let material = Zeroizing::new(keypair.to_keypair_bytes().to_vec());
        Self::new(id, KeyAlgorithm::X25519, material, created_at, expires_at)
    }

    /// Key identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Key algorithm.
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// Raw key material.
    pub fn material(&self) -> &[u8] {
        &self.material
    }

    /// Creation time (ms since epoch).
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Expiry time (ms since epoch), if any.
    pub fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }

    /// Whether the record's expiry has passed at `now_ms`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now_ms)
    }

    /// Public half of an X25519 record.
    pub fn public_key(&self) -> Option<[u8; 32]> {
        if self.algorithm != KeyAlgorithm::X25519 {
            return None;
        }
        self.material[32..64].try_into().ok()
    }

    /// Load the X25519 keypair held by this record.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedAlgorithm` for symmetric records.
    pub fn keypair(&self) -> Result<X25519KeyPair> {
        if self.algorithm != KeyAlgorithm::X25519 {
            return Err(Error::UnsupportedAlgorithm(format!(
                "{} record {} holds no keypair",
                self.algorithm, self.id
            )));
        }
        Ok(X25519KeyPair::from_keypair_bytes(&self.material)?)
    }

    /// Symmetric key used to seal and open envelopes under this record.
    ///
    /// Symmetric records use their material directly. X25519 records derive a
    /// sealing key from the private half bound to the key id.
    pub fn sealing_key(&self) -> Result<Zeroizing<[u8; 32]>> {
        match self.algorithm {
            KeyAlgorithm::X25519 => {
                let mut private = Zeroizing::new([0u8; 32]);
                private.copy_from_slice(&self.material[..32]);
                Ok(derive_static_key(&private, &self.id)?)
            }
            KeyAlgorithm::XChaCha20Poly1305 | KeyAlgorithm::XSalsa20Poly1305 => {
                let mut key = Zeroizing::new([0u8; 32]);
                key.copy_from_slice(&self.material);
                Ok(key)
            }
        }
    }
}

impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRecord")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm)
            .field("material", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
