//! X25519 key exchange (RFC 7748).
//!
//! Server long-term keys are stored in the libsodium layout, a 64-byte blob
//! holding the private scalar followed by the public point. Client ephemeral
//! keys are generated fresh for each handshake.
//!
//! # Security
//!
//! - All private keys and shared secrets are wrapped in `Zeroizing<>` to ensure
//!   they are securely cleared from memory when dropped.
//! - Low-order peer points are rejected (all-zero shared secret).
//!
//! # Example
//!
//! ```
//! use wb_crypto::kex::X25519KeyPair;
//!
//! # fn example() -> Result<(), wb_crypto::Error> {
//! let server = X25519KeyPair::generate()?;
//! let client = X25519KeyPair::generate()?;
//!
//! let server_shared = server.exchange(client.public_key())?;
//! let client_shared = client.exchange(server.public_key())?;
//!
//! assert_eq!(*server_shared, *client_shared);
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// Length of a serialized keypair (private || public).
pub const KEYPAIR_LEN: usize = 64;

/// Length of an X25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// X25519 key pair for Elliptic Curve Diffie-Hellman key exchange.
///
/// The private key is automatically zeroed when dropped.
pub struct X25519KeyPair {
    /// Private scalar (32 bytes), zeroed on drop.
    private_key: Zeroizing<StaticSecret>,
    /// Public key point (32 bytes).
    public_key: PublicKey,
}

impl X25519KeyPair {
    /// Generate a new random X25519 keypair using a cryptographically secure RNG.
    ///
    /// # Errors
    ///
    /// This function should not fail under normal circumstances. It returns a `Result`
    /// for consistency with other key generation functions.
    pub fn generate() -> Result<Self> {
        let private_key = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let public_key = PublicKey::from(&private_key);

        Ok(Self {
            private_key: Zeroizing::new(private_key),
            public_key,
        })
    }

    /// Create an X25519 keypair from a raw private key.
    ///
    /// # Example
    ///
    /// ```
    /// use wb_crypto::kex::X25519KeyPair;
    ///
    /// let keypair = X25519KeyPair::from_private([42u8; 32]).unwrap();
    /// assert_eq!(keypair.public_key().len(), 32);
    /// ```
    pub fn from_private(private: [u8; 32]) -> Result<Self> {
        let private = Zeroizing::new(private);
        let private_key = StaticSecret::from(*private);
        let public_key = PublicKey::from(&private_key);

        Ok(Self {
            private_key: Zeroizing::new(private_key),
            public_key,
        })
    }

    /// Load a keypair from its 64-byte `private || public` serialization.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidLength` if `bytes` is not exactly 64 bytes
    /// - `Error::InvalidPrivateKey` if the stored public half does not belong
    ///   to the private half
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEYPAIR_LEN {
            return Err(Error::InvalidLength {
                expected: KEYPAIR_LEN,
                actual: bytes.len(),
            });
        }

        let mut private = Zeroizing::new([0u8; 32]);
        private.copy_from_slice(&bytes[..32]);
        let keypair = Self::from_private(*private)?;

        if keypair.public_key() != &bytes[32..] {
            return Err(Error::InvalidPrivateKey(
                "public half does not match private half".into(),
            ));
        }

        Ok(keypair)
    }

    /// Serialize as `private || public` (64 bytes).
    pub fn to_keypair_bytes(&self) -> Zeroizing<[u8; KEYPAIR_LEN]> {
        let mut out = Zeroizing::new([0u8; KEYPAIR_LEN]);
        out[..32].copy_from_slice(self.private_key.as_bytes());
        out[32..].copy_from_slice(self.public_key.as_bytes());
        out
    }

    /// Get the public key as a 32-byte array.
    pub fn public_key(&self) -> &[u8; 32] {
        self.public_key.as_bytes()
    }

    /// Get the private scalar.
    pub fn private_key(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.private_key.to_bytes())
    }

    /// Perform X25519 key exchange with a peer's public key.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyExchange` if the peer's public key is a low-order
    /// point (the shared secret would be all zeros).
    pub fn exchange(&self, peer_public: &[u8; 32]) -> Result<Zeroizing<[u8; 32]>> {
        let peer_key = PublicKey::from(*peer_public);
        let shared = self.private_key.diffie_hellman(&peer_key);

        if !shared.was_contributory() {
            return Err(Error::KeyExchange(
                "Invalid peer public key (low-order point)".into(),
            ));
        }

        Ok(Zeroizing::new(*shared.as_bytes()))
    }
}

/// Parse an untrusted peer public key.
///
/// # Errors
///
/// Returns `Error::InvalidPublicKey` if the key is not exactly 32 bytes.
pub fn parse_public_key(bytes: &[u8]) -> Result<[u8; 32]> {
    bytes.try_into().map_err(|_| {
        Error::InvalidPublicKey(format!(
            "expected {} bytes, got {}",
            PUBLIC_KEY_LEN,
            bytes.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test X25519 key exchange against RFC 7748 §6.1 canonical test vectors.
    #[test]
    fn test_x25519_rfc7748_vectors() {
        let alice_private_bytes =
            hex::decode("77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a")
                .unwrap();
        let alice_public_expected =
            hex::decode("8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a")
                .unwrap();
        let bob_private_bytes =
            hex::decode("5dab087e624a8a4b79e17f8b83800ee66f3bb1292618b6fd1c2f8b27ff88e0eb")
                .unwrap();
        let bob_public_expected =
            hex::decode("de9edb7d7b7dc1b4d35b61c2ece435373f8343c85b78674dadfc7e146f882b4f")
                .unwrap();
        let expected_shared =
            hex::decode("4a5d9d5ba4ce2de1728e3bf480350f25e07e21c947d19e3376f09b3c1e161742")
                .unwrap();

        let alice = X25519KeyPair::from_private(alice_private_bytes.try_into().unwrap()).unwrap();
        assert_eq!(alice.public_key(), alice_public_expected.as_slice());

        let bob = X25519KeyPair::from_private(bob_private_bytes.try_into().unwrap()).unwrap();
        assert_eq!(bob.public_key(), bob_public_expected.as_slice());

        let alice_shared = alice.exchange(bob.public_key()).unwrap();
        let bob_shared = bob.exchange(alice.public_key()).unwrap();

        assert_eq!(&*alice_shared, expected_shared.as_slice());
        assert_eq!(&*bob_shared, expected_shared.as_slice());
    }

    /// Test that exchange rejects low-order points (all-zero public keys).
    #[test]
    fn test_reject_low_order_point() {
        let alice = X25519KeyPair::generate().unwrap();

        match alice.exchange(&[0u8; 32]) {
            Err(Error::KeyExchange(msg)) => assert!(msg.contains("low-order")),
            other => panic!("Expected KeyExchange error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_keypair_bytes_roundtrip() {
        let keypair = X25519KeyPair::generate().unwrap();
        let bytes = keypair.to_keypair_bytes();

        let restored = X25519KeyPair::from_keypair_bytes(&bytes[..]).unwrap();
        assert_eq!(restored.public_key(), keypair.public_key());
        assert_eq!(*restored.private_key(), *keypair.private_key());
    }

    #[test]
    fn test_keypair_bytes_wrong_length() {
        let result = X25519KeyPair::from_keypair_bytes(&[0u8; 63]);
        assert!(matches!(
            result,
            Err(Error::InvalidLength {
                expected: 64,
                actual: 63
            })
        ));
    }

    #[test]
    fn test_keypair_bytes_mismatched_public_half() {
        let keypair = X25519KeyPair::generate().unwrap();
        let mut bytes = keypair.to_keypair_bytes();
        bytes[40] ^= 0xFF;

        assert!(matches!(
            X25519KeyPair::from_keypair_bytes(&bytes[..]),
            Err(Error::InvalidPrivateKey(_))
        ));
    }

    #[test]
    fn test_parse_public_key() {
        assert!(parse_public_key(&[7u8; 32]).is_ok());
        assert!(matches!(
            parse_public_key(&[7u8; 31]),
            Err(Error::InvalidPublicKey(_))
        ));
    }
}
