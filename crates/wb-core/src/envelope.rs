//! Wire envelopes ("wire boxes").
//!
//! JSON form (bit-exact):
//!
//! ```text
//! { "iv": base64(nonce[24]), "data": base64(ciphertext || tag[16]), "kid": string, "ts": integer ms }
//! ```
//!
//! Binary form: `nonce[24] || ciphertext || tag[16]`. The binary form carries
//! neither key id nor timestamp; callers supply them out of band. The
//! "combined" form is the binary form in base64, used by browser clients and
//! queue payloads.

use crate::session::{SessionKeys, SESSION_KEY_ID};
use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use wb_crypto::aead::{self, NONCE_LEN, TAG_LEN};
use wb_crypto::CipherSuite;
use wb_keys::{Clock, KeyRecord, SystemClock};
use zeroize::Zeroizing;

/// A sealed message.
///
/// Invariants: the nonce is exactly 24 bytes and the ciphertext is at least
/// one tag long. Both are enforced by every constructor.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireBox", into = "WireBox")]
pub struct WireEnvelope {
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
    key_id: String,
    timestamp: u64,
}

/// JSON shape of a wire envelope.
#[derive(Serialize, Deserialize)]
struct WireBox {
    iv: String,
    data: String,
    kid: String,
    ts: u64,
}

impl WireEnvelope {
    /// Assemble an envelope from its parts.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedEnvelope` if the nonce is not 24 bytes or the
    /// ciphertext is shorter than the tag.
    pub fn new(
        nonce: &[u8],
        ciphertext: Vec<u8>,
        key_id: impl Into<String>,
        timestamp: u64,
    ) -> Result<Self> {
        let nonce: [u8; NONCE_LEN] = nonce.try_into().map_err(|_| {
            Error::MalformedEnvelope(format!(
                "nonce must be {} bytes, got {}",
                NONCE_LEN,
                nonce.len()
            ))
        })?;

        if ciphertext.len() < TAG_LEN {
            return Err(Error::MalformedEnvelope(format!(
                "ciphertext shorter than {}-byte tag ({} bytes)",
                TAG_LEN,
                ciphertext.len()
            )));
        }

        Ok(Self {
            nonce,
            ciphertext,
            key_id: key_id.into(),
            timestamp,
        })
    }

    /// 24-byte nonce.
    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    /// Ciphertext with the tag appended.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Id of the key the envelope was sealed under, or `"session"`.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Seal time (ms since epoch).
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Whether the envelope was sealed under session keys.
    pub fn is_session(&self) -> bool {
        self.key_id == SESSION_KEY_ID
    }

    /// Encode as `nonce || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Decode `nonce || ciphertext` with out-of-band metadata.
    pub fn from_bytes(bytes: &[u8], key_id: impl Into<String>, timestamp: u64) -> Result<Self> {
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::MalformedEnvelope(format!(
                "need at least {} bytes, got {}",
                NONCE_LEN + TAG_LEN,
                bytes.len()
            )));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        Self::new(nonce, ciphertext.to_vec(), key_id, timestamp)
    }

    /// Encode the binary form as base64.
    pub fn to_combined_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Decode the base64 binary form with out-of-band metadata.
    pub fn from_combined_base64(
        encoded: &str,
        key_id: impl Into<String>,
        timestamp: u64,
    ) -> Result<Self> {
        let bytes = decode_field("combined", encoded)?;
        Self::from_bytes(&bytes, key_id, timestamp)
    }

    /// Encode as a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Encode as a JSON value.
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::MalformedEnvelope(e.to_string()))
    }

    /// Decode from a JSON value.
    pub fn from_json_value(value: &serde_json::Value) -> Result<Self> {
        Self::deserialize(value).map_err(|e| Error::MalformedEnvelope(e.to_string()))
    }
}

impl fmt::Debug for WireEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireEnvelope")
            .field("kid", &self.key_id)
            .field("ts", &self.timestamp)
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

impl TryFrom<WireBox> for WireEnvelope {
    type Error = Error;

    fn try_from(wire: WireBox) -> Result<Self> {
        let nonce = decode_field("iv", &wire.iv)?;
        let ciphertext = decode_field("data", &wire.data)?;
        Self::new(&nonce, ciphertext, wire.kid, wire.ts)
    }
}

impl From<WireEnvelope> for WireBox {
    fn from(envelope: WireEnvelope) -> Self {
        Self {
            iv: STANDARD.encode(envelope.nonce),
            data: STANDARD.encode(&envelope.ciphertext),
            kid: envelope.key_id,
            ts: envelope.timestamp,
        }
    }
}

fn decode_field(name: &str, encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .map_err(|e| Error::MalformedEnvelope(format!("{}: invalid base64: {}", name, e)))
}

/// Whether `value` has the shape of a wire envelope.
///
/// Checks field presence and types only; base64 validity and lengths are
/// checked when the envelope is decoded.
pub fn is_wire_box(value: &serde_json::Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };

    object.get("iv").is_some_and(serde_json::Value::is_string)
        && object.get("data").is_some_and(serde_json::Value::is_string)
        && object.get("kid").is_some_and(serde_json::Value::is_string)
        && object.get("ts").is_some_and(serde_json::Value::is_u64)
}

/// A 32-byte symmetric key together with the key id envelopes carry.
#[derive(Clone)]
pub struct SealingKey {
    key: Zeroizing<[u8; 32]>,
    key_id: String,
}

impl SealingKey {
    /// Wrap raw key material.
    pub fn new(key_id: impl Into<String>, key: Zeroizing<[u8; 32]>) -> Self {
        Self {
            key,
            key_id: key_id.into(),
        }
    }

    /// Static key of a stored record.
    pub fn from_record(record: &KeyRecord) -> Result<Self> {
        Ok(Self::new(record.id(), record.sealing_key()?))
    }

    /// Session key for outbound envelopes.
    pub fn session_tx(session: &SessionKeys) -> Self {
        Self::new(SESSION_KEY_ID, Zeroizing::new(*session.tx()))
    }

    /// Session key for inbound envelopes.
    pub fn session_rx(session: &SessionKeys) -> Self {
        Self::new(SESSION_KEY_ID, Zeroizing::new(*session.rx()))
    }

    /// Key id carried by envelopes sealed under this key.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealingKey")
            .field("kid", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Seals and opens wire envelopes.
///
/// Key-agnostic: the caller picks the key (session or stored record). Holds no
/// per-message state, so one codec is shared across threads.
#[derive(Clone)]
pub struct EnvelopeCodec {
    suite: CipherSuite,
    bind_metadata: bool,
    clock: Arc<dyn Clock>,
}

impl EnvelopeCodec {
    /// Codec for `suite` on the system clock.
    pub fn new(suite: CipherSuite) -> Self {
        Self::with_clock(suite, Arc::new(SystemClock))
    }

    /// Codec for `suite` on an explicit clock.
    ///
    /// Metadata binding starts enabled whenever the suite supports associated
    /// data.
    pub fn with_clock(suite: CipherSuite, clock: Arc<dyn Clock>) -> Self {
        Self {
            suite,
            bind_metadata: suite.supports_aad(),
            clock,
        }
    }

    /// Authenticate `kid` and `ts` as associated data.
    ///
    /// Envelopes sealed this way only open on codecs with binding enabled.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedSuite` if the suite has no associated data.
    pub fn bind_metadata(mut self, enabled: bool) -> Result<Self> {
        if enabled && !self.suite.supports_aad() {
            return Err(Error::UnsupportedSuite(format!(
                "{} cannot bind envelope metadata",
                self.suite.name()
            )));
        }
        self.bind_metadata = enabled;
        Ok(self)
    }

    /// Configured suite.
    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    /// Seal `plaintext` with a fresh random nonce, stamped with the current time.
    pub fn seal(&self, plaintext: &[u8], key: &SealingKey) -> Result<WireEnvelope> {
        self.seal_at(plaintext, key, self.clock.now_ms())
    }

    /// Seal `plaintext` stamped with `timestamp`.
    pub fn seal_at(&self, plaintext: &[u8], key: &SealingKey, timestamp: u64) -> Result<WireEnvelope> {
        let nonce = aead::random_nonce();
        let aad = self.associated_data(&key.key_id, timestamp);
        let ciphertext = aead::seal(self.suite, &key.key, &nonce, plaintext, &aad)?;

        Ok(WireEnvelope {
            nonce,
            ciphertext,
            key_id: key.key_id.clone(),
            timestamp,
        })
    }

    /// Open an envelope.
    ///
    /// # Errors
    ///
    /// - `Error::MalformedEnvelope` if the ciphertext is shorter than a tag
    /// - `Error::AuthenticationFailed` if the tag does not verify, whether the
    ///   key is wrong or the envelope was tampered with
    pub fn open(&self, envelope: &WireEnvelope, key: &SealingKey) -> Result<Zeroizing<Vec<u8>>> {
        if envelope.ciphertext.len() < TAG_LEN {
            return Err(Error::MalformedEnvelope("ciphertext shorter than tag".into()));
        }

        let aad = self.associated_data(&envelope.key_id, envelope.timestamp);
        Ok(aead::open(
            self.suite,
            &key.key,
            &envelope.nonce,
            &envelope.ciphertext,
            &aad,
        )?)
    }

    fn associated_data(&self, key_id: &str, timestamp: u64) -> Vec<u8> {
        if self.bind_metadata {
            format!("{}.{}", key_id, timestamp).into_bytes()
        } else {
            Vec::new()
        }
    }
}

impl fmt::Debug for EnvelopeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeCodec")
            .field("suite", &self.suite)
            .field("bind_metadata", &self.bind_metadata)
            .finish_non_exhaustive()
    }
}
