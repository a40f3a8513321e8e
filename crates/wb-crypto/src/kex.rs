//! Key exchange implementations.
//!
//! Implements:
//! - X25519 (RFC 7748)
//!
//! Verified against the RFC 7748 §6.1 vectors.

pub mod x25519;

pub use self::x25519::{X25519KeyPair, KEYPAIR_LEN, PUBLIC_KEY_LEN};
