//! AEAD (Authenticated Encryption with Associated Data) implementations.
//!
//! Implements:
//! - XChaCha20-Poly1305 (draft-irtf-cfrg-xchacha) for the default suite
//! - XSalsa20-Poly1305 (NaCl secretbox) behind the `secretbox` feature
//!
//! Both use 192-bit nonces, which makes random nonces safe: the collision
//! probability stays negligible far beyond any realistic message volume under
//! a single key.

use crate::suite::CipherSuite;
use crate::{Error, Result};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use zeroize::Zeroizing;

/// Symmetric key length for every suite (bytes).
pub const KEY_LEN: usize = 32;

/// Nonce length for every suite (bytes).
pub const NONCE_LEN: usize = 24;

/// Authentication tag length for every suite (bytes).
pub const TAG_LEN: usize = 16;

/// Generate a full-width random nonce from the OS CSPRNG.
///
/// # Example
/// ```
/// use wb_crypto::aead::{random_nonce, NONCE_LEN};
///
/// let a = random_nonce();
/// let b = random_nonce();
/// assert_eq!(a.len(), NONCE_LEN);
/// assert_ne!(a, b);
/// ```
pub fn random_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Generate a random 32-byte symmetric key.
pub fn random_key() -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    rand::rngs::OsRng.fill_bytes(key.as_mut());
    key
}

/// Encrypt under `suite`.
///
/// Returns ciphertext with the 16-byte tag included.
///
/// # Errors
/// Returns `Error::UnsupportedSuite` if the suite is compiled out or if `aad`
/// is non-empty for a suite without associated data.
pub fn seal(
    suite: CipherSuite,
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    match suite {
        CipherSuite::XChaCha20Poly1305 => xchacha20poly1305_encrypt(key, nonce, plaintext, aad),
        CipherSuite::XSalsa20Poly1305 => {
            if !aad.is_empty() {
                return Err(Error::UnsupportedSuite(format!(
                    "{} does not authenticate associated data",
                    suite.name()
                )));
            }
            secretbox_seal(key, nonce, plaintext)
        }
    }
}

/// Decrypt under `suite`.
///
/// # Errors
/// Returns `Error::Decryption` if the tag does not verify, whatever the cause.
pub fn open(
    suite: CipherSuite,
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext_and_tag: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    match suite {
        CipherSuite::XChaCha20Poly1305 => {
            xchacha20poly1305_decrypt(key, nonce, ciphertext_and_tag, aad)
        }
        CipherSuite::XSalsa20Poly1305 => {
            if !aad.is_empty() {
                return Err(Error::UnsupportedSuite(format!(
                    "{} does not authenticate associated data",
                    suite.name()
                )));
            }
            secretbox_open(key, nonce, ciphertext_and_tag)
        }
    }
}

/// Encrypt with XChaCha20-Poly1305.
///
/// # Arguments
/// * `key` - 32-byte encryption key
/// * `nonce` - 24-byte nonce (must be unique per key)
/// * `plaintext` - Data to encrypt
/// * `aad` - Additional authenticated data (not encrypted, but authenticated)
///
/// # Returns
/// Ciphertext with appended 16-byte authentication tag.
///
/// # Example
/// ```
/// use wb_crypto::aead::xchacha20poly1305_encrypt;
///
/// let key = [0x42; 32];
/// let nonce = [0x01; 24];
/// let ciphertext = xchacha20poly1305_encrypt(&key, &nonce, b"Hello", b"").unwrap();
/// assert_eq!(ciphertext.len(), 5 + 16);
/// ```
pub fn xchacha20poly1305_encrypt(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));

    let payload = Payload {
        msg: plaintext,
        aad,
    };

    cipher
        .encrypt(XNonce::from_slice(nonce), payload)
        .map_err(|_| Error::Encryption("XChaCha20-Poly1305 encryption failed".into()))
}

/// Decrypt with XChaCha20-Poly1305.
///
/// # Errors
/// Returns `Error::Decryption` if tag verification fails.
pub fn xchacha20poly1305_decrypt(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext_and_tag: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));

    let payload = Payload {
        msg: ciphertext_and_tag,
        aad,
    };

    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce), payload)
        .map_err(|_| Error::Decryption)?;

    Ok(Zeroizing::new(plaintext))
}

/// Encrypt with XSalsa20-Poly1305 (NaCl `crypto_secretbox_easy` layout).
#[cfg(feature = "secretbox")]
pub fn xsalsa20poly1305_encrypt(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    use crypto_secretbox::aead::generic_array::GenericArray;
    use crypto_secretbox::aead::{Aead, KeyInit};
    use crypto_secretbox::XSalsa20Poly1305;

    let cipher = XSalsa20Poly1305::new(GenericArray::from_slice(key));

    cipher
        .encrypt(GenericArray::from_slice(nonce), plaintext)
        .map_err(|_| Error::Encryption("XSalsa20-Poly1305 encryption failed".into()))
}

/// Decrypt with XSalsa20-Poly1305 (NaCl `crypto_secretbox_open_easy` layout).
///
/// # Errors
/// Returns `Error::Decryption` if tag verification fails.
#[cfg(feature = "secretbox")]
pub fn xsalsa20poly1305_decrypt(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext_and_tag: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    use crypto_secretbox::aead::generic_array::GenericArray;
    use crypto_secretbox::aead::{Aead, KeyInit};
    use crypto_secretbox::XSalsa20Poly1305;

    let cipher = XSalsa20Poly1305::new(GenericArray::from_slice(key));

    let plaintext = cipher
        .decrypt(GenericArray::from_slice(nonce), ciphertext_and_tag)
        .map_err(|_| Error::Decryption)?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(feature = "secretbox")]
fn secretbox_seal(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    xsalsa20poly1305_encrypt(key, nonce, plaintext)
}

#[cfg(feature = "secretbox")]
fn secretbox_open(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext_and_tag: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    xsalsa20poly1305_decrypt(key, nonce, ciphertext_and_tag)
}

#[cfg(not(feature = "secretbox"))]
fn secretbox_seal(_: &[u8; KEY_LEN], _: &[u8; NONCE_LEN], _: &[u8]) -> Result<Vec<u8>> {
    Err(Error::UnsupportedSuite(
        CipherSuite::XSalsa20Poly1305.name().into(),
    ))
}

#[cfg(not(feature = "secretbox"))]
fn secretbox_open(
    _: &[u8; KEY_LEN],
    _: &[u8; NONCE_LEN],
    _: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    Err(Error::UnsupportedSuite(
        CipherSuite::XSalsa20Poly1305.name().into(),
    ))
}
