//! Cryptographic primitives for the wirebox envelope protocol.
//!
//! This crate implements the building blocks the session protocol is made of:
//! - Key exchange (X25519)
//! - AEAD encryption with 24-byte nonces (XChaCha20-Poly1305, XSalsa20-Poly1305)
//! - Key derivation (libsodium `crypto_kx` compatible BLAKE2b, HKDF-SHA256)
//! - A capability registry of the cipher suites compiled into this build
//!
//! Security rules followed throughout:
//! - All secrets use Zeroizing wrappers
//! - Nonces come from the OS CSPRNG at full width
//! - No logging of key material

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aead;
pub mod error;
pub mod kdf;
pub mod kex;
pub mod suite;

pub use error::{Error, Result};
pub use suite::{CipherSuite, KxKdf, SuiteRegistry};
