//! Client side of the handshake.

use crate::handshake::{HandshakeHeaders, HandshakeRequest, PublicKeyInfo};
use crate::session::{SessionDeriver, SessionKeys};
use crate::Result;
use wb_crypto::kex::X25519KeyPair;
use wb_crypto::KxKdf;

/// An ephemeral client keypair bound to one handshake timestamp.
pub struct ClientHandshake {
    keypair: X25519KeyPair,
    timestamp: u64,
}

impl ClientHandshake {
    /// Generate a fresh ephemeral keypair for a handshake at `timestamp`.
    pub fn new(timestamp: u64) -> Result<Self> {
        Ok(Self {
            keypair: X25519KeyPair::generate()?,
            timestamp,
        })
    }

    /// Use a specific keypair (test vectors).
    pub fn with_keypair(keypair: X25519KeyPair, timestamp: u64) -> Self {
        Self { keypair, timestamp }
    }

    /// Ephemeral public key.
    pub fn public_key(&self) -> &[u8; 32] {
        self.keypair.public_key()
    }

    /// Handshake timestamp.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// The handshake as a JSON-body request.
    pub fn request(&self) -> HandshakeRequest {
        HandshakeRequest {
            client_public: *self.keypair.public_key(),
            timestamp: self.timestamp,
        }
    }

    /// The handshake as headers, signed when `secret` is given.
    pub fn headers(&self, secret: Option<&[u8]>) -> Result<HandshakeHeaders> {
        HandshakeHeaders::build(self.keypair.public_key(), self.timestamp, secret)
    }

    /// Derive the client's session keys against the server's exposed key.
    ///
    /// The result mirrors the server's: client `tx` is server `rx`.
    pub fn derive(&self, server: &PublicKeyInfo, kdf: KxKdf) -> Result<SessionKeys> {
        self.derive_raw(&server.public_key()?, kdf)
    }

    /// Derive against a raw server public key.
    pub fn derive_raw(&self, server_public: &[u8], kdf: KxKdf) -> Result<SessionKeys> {
        SessionDeriver::new(kdf).derive_client(&self.keypair, server_public, self.timestamp)
    }
}
