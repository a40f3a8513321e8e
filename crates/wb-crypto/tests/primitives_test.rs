//! Property tests across the primitives.

use proptest::prelude::*;
use wb_crypto::aead::{self, NONCE_LEN, TAG_LEN};
use wb_crypto::kdf::{derive_session_keys, KeyDirection};
use wb_crypto::kex::X25519KeyPair;
use wb_crypto::{CipherSuite, Error, KxKdf, SuiteRegistry};

proptest! {
    /// Every available suite round-trips and appends exactly one tag.
    #[test]
    fn prop_suites_roundtrip(
        key in any::<[u8; 32]>(),
        nonce in any::<[u8; NONCE_LEN]>(),
        plaintext in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        for &suite in SuiteRegistry::builtin().available() {
            let ciphertext = aead::seal(suite, &key, &nonce, &plaintext, b"").unwrap();
            prop_assert_eq!(ciphertext.len(), plaintext.len() + TAG_LEN);

            let opened = aead::open(suite, &key, &nonce, &ciphertext, b"").unwrap();
            prop_assert_eq!(opened.as_slice(), plaintext.as_slice());
        }
    }

    /// Both sides of an exchange derive the same directional keys.
    #[test]
    fn prop_exchange_agrees(
        server_private in any::<[u8; 32]>(),
        client_private in any::<[u8; 32]>(),
    ) {
        let server = X25519KeyPair::from_private(server_private).unwrap();
        let client = X25519KeyPair::from_private(client_private).unwrap();

        let server_shared = server.exchange(client.public_key()).unwrap();
        let client_shared = client.exchange(server.public_key()).unwrap();

        for kdf in [KxKdf::Blake2b, KxKdf::HkdfSha256] {
            let on_server =
                derive_session_keys(kdf, &server_shared, client.public_key(), server.public_key())
                    .unwrap();
            let on_client =
                derive_session_keys(kdf, &client_shared, client.public_key(), server.public_key())
                    .unwrap();

            for direction in [KeyDirection::ClientToServer, KeyDirection::ServerToClient] {
                prop_assert_eq!(**on_server.get(direction), **on_client.get(direction));
            }
        }
    }
}

/// Unknown suites are a configuration error surfaced once.
#[test]
fn test_unknown_suite_names() {
    let registry = SuiteRegistry::builtin();
    for name in ["Kyber768", "AES-256-GCM", ""] {
        assert!(matches!(
            registry.require(name),
            Err(Error::UnsupportedSuite(_))
        ));
    }
    assert_eq!(
        registry.require("xchacha20-poly1305").unwrap(),
        CipherSuite::XChaCha20Poly1305
    );
}
