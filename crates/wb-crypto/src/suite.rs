//! Cipher suite definitions and the capability registry.
//!
//! Every suite seals with a 32-byte key, a 24-byte nonce and a 16-byte tag, so
//! the envelope layout does not depend on which suite is configured.

use crate::{Error, Result};

/// AEAD suites usable for wire envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CipherSuite {
    /// XChaCha20-Poly1305 (draft-irtf-cfrg-xchacha).
    /// Default suite, always compiled in.
    XChaCha20Poly1305 = 0x01,

    /// XSalsa20-Poly1305, byte-compatible with NaCl `crypto_secretbox_easy`.
    /// Requires the `secretbox` feature.
    XSalsa20Poly1305 = 0x02,
}

impl CipherSuite {
    /// All suites this crate knows about, whether or not they are compiled in.
    pub const ALL: [CipherSuite; 2] = [Self::XChaCha20Poly1305, Self::XSalsa20Poly1305];

    /// Convert from wire format (u8).
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::XChaCha20Poly1305),
            0x02 => Some(Self::XSalsa20Poly1305),
            _ => None,
        }
    }

    /// Convert to wire format (u8).
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Canonical algorithm name, as used in configuration and key records.
    pub fn name(&self) -> &'static str {
        match self {
            Self::XChaCha20Poly1305 => "XChaCha20-Poly1305",
            Self::XSalsa20Poly1305 => "XSalsa20-Poly1305",
        }
    }

    /// Look up a suite by name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|suite| suite.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Whether the suite authenticates associated data.
    ///
    /// NaCl secretbox has no AAD input.
    pub fn supports_aad(&self) -> bool {
        matches!(self, Self::XChaCha20Poly1305)
    }

    /// Whether an implementation of this suite is compiled into this build.
    pub fn is_available(&self) -> bool {
        match self {
            Self::XChaCha20Poly1305 => true,
            Self::XSalsa20Poly1305 => cfg!(feature = "secretbox"),
        }
    }
}

impl Default for CipherSuite {
    fn default() -> Self {
        Self::XChaCha20Poly1305
    }
}

/// KDF used to split an X25519 shared point into directional session keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KxKdf {
    /// `BLAKE2b-512(q || client_pk || server_pk)`, identical to libsodium
    /// `crypto_kx_*_session_keys`.
    #[default]
    Blake2b,

    /// HKDF-SHA256 with salt `client_pk || server_pk`.
    HkdfSha256,
}

impl KxKdf {
    /// Canonical name used in configuration.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Blake2b => "blake2b",
            Self::HkdfSha256 => "hkdf-sha256",
        }
    }

    /// Look up a KDF by name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Blake2b, Self::HkdfSha256]
            .into_iter()
            .find(|kdf| kdf.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Registry of the cipher suites available in this build.
///
/// Queried once at startup so that a missing implementation is reported as a
/// configuration error instead of failing on the first message.
#[derive(Debug, Clone)]
pub struct SuiteRegistry {
    suites: Vec<CipherSuite>,
}

impl SuiteRegistry {
    /// Registry of every suite compiled into this build.
    pub fn builtin() -> Self {
        Self {
            suites: CipherSuite::ALL
                .into_iter()
                .filter(CipherSuite::is_available)
                .collect(),
        }
    }

    /// Suites available, in preference order.
    pub fn available(&self) -> &[CipherSuite] {
        &self.suites
    }

    /// Whether `suite` can be used.
    pub fn supports(&self, suite: CipherSuite) -> bool {
        self.suites.contains(&suite)
    }

    /// Ensure `suite` is available.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedSuite` if the suite is compiled out.
    pub fn ensure(&self, suite: CipherSuite) -> Result<CipherSuite> {
        if self.supports(suite) {
            Ok(suite)
        } else {
            Err(Error::UnsupportedSuite(suite.name().into()))
        }
    }

    /// Resolve a suite by name and ensure it is available.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedSuite` for unknown names (e.g. post-quantum
    /// schemes that this build does not provide) or compiled-out suites.
    pub fn require(&self, name: &str) -> Result<CipherSuite> {
        let suite =
            CipherSuite::from_name(name).ok_or_else(|| Error::UnsupportedSuite(name.into()))?;
        self.ensure(suite)
    }
}

impl Default for SuiteRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
