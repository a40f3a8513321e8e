//! Key derivation functions.
//!
//! Implements:
//! - Generic HKDF-SHA256 (RFC 5869)
//! - Directional session key derivation from an X25519 shared point, either
//!   libsodium `crypto_kx` compatible (BLAKE2b-512) or HKDF-SHA256
//! - Static sealing key derivation from a stored keypair record
//!
//! Both session KDFs mix the client and the server public keys into the
//! output, so a swapped or substituted public key yields unrelated keys.

use crate::suite::KxKdf;
use crate::{Error, Result};
use blake2::{Blake2b512, Digest};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Key direction for traffic key selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDirection {
    /// Client-to-server key.
    ClientToServer,
    /// Server-to-client key.
    ServerToClient,
}

/// Directional key pair produced by a session KDF.
pub struct DirectionalKeys {
    /// Key protecting client-to-server traffic.
    pub client_to_server: Zeroizing<[u8; 32]>,
    /// Key protecting server-to-client traffic.
    pub server_to_client: Zeroizing<[u8; 32]>,
}

impl DirectionalKeys {
    /// Select the key for `direction`.
    pub fn get(&self, direction: KeyDirection) -> &Zeroizing<[u8; 32]> {
        match direction {
            KeyDirection::ClientToServer => &self.client_to_server,
            KeyDirection::ServerToClient => &self.server_to_client,
        }
    }

    fn from_okm(okm: &[u8]) -> Result<Self> {
        if okm.len() != 64 {
            return Err(Error::InvalidLength {
                expected: 64,
                actual: okm.len(),
            });
        }

        let mut client_to_server = Zeroizing::new([0u8; 32]);
        let mut server_to_client = Zeroizing::new([0u8; 32]);
        client_to_server.copy_from_slice(&okm[0..32]);
        server_to_client.copy_from_slice(&okm[32..64]);

        if *client_to_server == *server_to_client {
            return Err(Error::KeyDerivation(
                "directional keys must differ".into(),
            ));
        }

        Ok(Self {
            client_to_server,
            server_to_client,
        })
    }
}

/// Generic HKDF-SHA256 key derivation per RFC 5869.
///
/// # Arguments
/// * `ikm` - Input key material
/// * `salt` - Salt value (empty slice for no salt)
/// * `info` - Context and application-specific information
/// * `output_len` - Length of output key material
///
/// # Example
/// ```
/// use wb_crypto::kdf::hkdf_sha256;
///
/// let okm = hkdf_sha256(&[0x0b; 22], b"salt", b"info", 42).unwrap();
/// assert_eq!(okm.len(), 42);
/// ```
pub fn hkdf_sha256(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
    output_len: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);

    let mut okm = Zeroizing::new(vec![0u8; output_len]);
    hk.expand(info, &mut okm)
        .map_err(|_| Error::KeyDerivation("HKDF expansion failed".into()))?;

    Ok(okm)
}

/// Derive directional keys the way libsodium `crypto_kx` does.
///
/// `BLAKE2b-512(shared || client_pk || server_pk)`; the first half protects
/// client-to-server traffic, the second half server-to-client traffic.
pub fn kx_blake2b(
    shared_secret: &[u8; 32],
    client_public: &[u8; 32],
    server_public: &[u8; 32],
) -> Result<DirectionalKeys> {
    let mut hasher = Blake2b512::new();
    hasher.update(shared_secret);
    hasher.update(client_public);
    hasher.update(server_public);
    let okm = Zeroizing::new(hasher.finalize().to_vec());

    DirectionalKeys::from_okm(&okm)
}

/// Derive directional keys with HKDF-SHA256.
///
/// Uses HKDF-SHA256 with:
/// - IKM: shared_secret
/// - Salt: client_pk || server_pk
/// - Info: "wirebox-kx-session-keys"
/// - Length: 64 bytes (c2s || s2c)
pub fn kx_hkdf_sha256(
    shared_secret: &[u8; 32],
    client_public: &[u8; 32],
    server_public: &[u8; 32],
) -> Result<DirectionalKeys> {
    let mut salt = [0u8; 64];
    salt[..32].copy_from_slice(client_public);
    salt[32..].copy_from_slice(server_public);

    let okm = hkdf_sha256(shared_secret, &salt, b"wirebox-kx-session-keys", 64)?;

    DirectionalKeys::from_okm(&okm)
}

/// Derive directional session keys with the configured KDF.
pub fn derive_session_keys(
    kdf: KxKdf,
    shared_secret: &[u8; 32],
    client_public: &[u8; 32],
    server_public: &[u8; 32],
) -> Result<DirectionalKeys> {
    match kdf {
        KxKdf::Blake2b => kx_blake2b(shared_secret, client_public, server_public),
        KxKdf::HkdfSha256 => kx_hkdf_sha256(shared_secret, client_public, server_public),
    }
}

/// Derive the symmetric sealing key of a stored keypair record.
///
/// The X25519 private scalar is never used as an AEAD key directly.
///
/// Uses HKDF-SHA256 with:
/// - IKM: private half of the keypair
/// - Salt: key id (UTF-8)
/// - Info: "wirebox-static-key"
/// - Length: 32 bytes
pub fn derive_static_key(private_key: &[u8; 32], key_id: &str) -> Result<Zeroizing<[u8; 32]>> {
    let okm = hkdf_sha256(private_key, key_id.as_bytes(), b"wirebox-static-key", 32)?;

    let mut result = Zeroizing::new([0u8; 32]);
    result.copy_from_slice(&okm);

    Ok(result)
}
