//! Session key derivation.
//!
//! Implements:
//! - X25519 exchange between the server long-term key and a client ephemeral key
//! - Directional key split (libsodium `crypto_kx` compatible by default)
//! - Role-dependent rx/tx assignment
//!
//! The server receives on the client-to-server key and transmits on the
//! server-to-client key; the client mirrors this, so server `tx` equals client
//! `rx` and vice versa.

use crate::{Error, Result};
use std::fmt;
use wb_crypto::kdf::{derive_session_keys, KeyDirection};
use wb_crypto::kex::{x25519::parse_public_key, X25519KeyPair};
use wb_crypto::KxKdf;
use wb_keys::KeyProvider;
use zeroize::Zeroizing;

/// Key id envelopes carry when sealed under session keys.
pub const SESSION_KEY_ID: &str = "session";

/// Session role (Client or Server).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Client role (initiates handshake).
    Client,
    /// Server role (accepts handshake).
    Server,
}

impl Role {
    fn receive_direction(self) -> KeyDirection {
        match self {
            Self::Server => KeyDirection::ClientToServer,
            Self::Client => KeyDirection::ServerToClient,
        }
    }

    fn transmit_direction(self) -> KeyDirection {
        match self {
            Self::Server => KeyDirection::ServerToClient,
            Self::Client => KeyDirection::ClientToServer,
        }
    }
}

/// Directional keys of one handshake.
///
/// Request-scoped: never written to a key store. Cloning copies the key
/// material into fresh zeroizing buffers.
#[derive(Clone)]
pub struct SessionKeys {
    rx: Zeroizing<[u8; 32]>,
    tx: Zeroizing<[u8; 32]>,
    role: Role,
    established_at: u64,
    client_public: [u8; 32],
    server_public: [u8; 32],
}

impl SessionKeys {
    /// Key used to open inbound envelopes.
    pub fn rx(&self) -> &[u8; 32] {
        &self.rx
    }

    /// Key used to seal outbound envelopes.
    pub fn tx(&self) -> &[u8; 32] {
        &self.tx
    }

    /// Key id of envelopes sealed under these keys.
    pub fn id(&self) -> &'static str {
        SESSION_KEY_ID
    }

    /// Which side of the handshake these keys belong to.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Handshake timestamp (ms since epoch) the keys are bound to.
    pub fn established_at(&self) -> u64 {
        self.established_at
    }

    /// Client ephemeral public key.
    pub fn client_public(&self) -> &[u8; 32] {
        &self.client_public
    }

    /// Server public key.
    pub fn server_public(&self) -> &[u8; 32] {
        &self.server_public
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("id", &SESSION_KEY_ID)
            .field("role", &self.role)
            .field("established_at", &self.established_at)
            .finish_non_exhaustive()
    }
}

/// Derives session keys from a handshake.
///
/// Stateless apart from the configured KDF; never mutates a key store.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionDeriver {
    kdf: KxKdf,
}

impl SessionDeriver {
    /// Create a deriver using `kdf` for the directional split.
    pub fn new(kdf: KxKdf) -> Self {
        Self { kdf }
    }

    /// Configured KDF.
    pub fn kdf(&self) -> KxKdf {
        self.kdf
    }

    /// Server side: derive keys for a client ephemeral public key.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidPeerKey` if `client_public` is not 32 bytes or is a
    ///   low-order point
    pub fn derive(
        &self,
        server: &X25519KeyPair,
        client_public: &[u8],
        timestamp: u64,
    ) -> Result<SessionKeys> {
        let client_public = parse_peer_key(client_public)?;
        let shared = server
            .exchange(&client_public)
            .map_err(|e| Error::InvalidPeerKey(e.to_string()))?;

        self.split(
            Role::Server,
            &shared,
            client_public,
            *server.public_key(),
            timestamp,
        )
    }

    /// Server side: derive keys with the provider's current keypair.
    ///
    /// # Errors
    ///
    /// - `Error::KeyUnavailable` if the provider has no current key
    /// - `Error::InvalidPeerKey` as for `derive`
    pub fn derive_with_provider(
        &self,
        provider: &dyn KeyProvider,
        client_public: &[u8],
        timestamp: u64,
    ) -> Result<SessionKeys> {
        let record = provider.current_key()?;
        let server = record
            .keypair()
            .map_err(|e| Error::KeyUnavailable(e.to_string()))?;
        self.derive(&server, client_public, timestamp)
    }

    /// Client side: derive keys for the server's public key.
    pub fn derive_client(
        &self,
        client: &X25519KeyPair,
        server_public: &[u8],
        timestamp: u64,
    ) -> Result<SessionKeys> {
        let server_public = parse_peer_key(server_public)?;
        let shared = client
            .exchange(&server_public)
            .map_err(|e| Error::InvalidPeerKey(e.to_string()))?;

        self.split(
            Role::Client,
            &shared,
            *client.public_key(),
            server_public,
            timestamp,
        )
    }

    fn split(
        &self,
        role: Role,
        shared: &[u8; 32],
        client_public: [u8; 32],
        server_public: [u8; 32],
        timestamp: u64,
    ) -> Result<SessionKeys> {
        let keys = derive_session_keys(self.kdf, shared, &client_public, &server_public)?;

        Ok(SessionKeys {
            rx: keys.get(role.receive_direction()).clone(),
            tx: keys.get(role.transmit_direction()).clone(),
            role,
            established_at: timestamp,
            client_public,
            server_public,
        })
    }
}

fn parse_peer_key(bytes: &[u8]) -> Result<[u8; 32]> {
    parse_public_key(bytes).map_err(|e| Error::InvalidPeerKey(e.to_string()))
}
