//! Message-queue payloads.
//!
//! Queue records carry the combined binary form of an envelope:
//!
//! ```text
//! { "value": base64(nonce || ciphertext), "timestamp": "<ms>", "kid": "<key id>" }
//! ```
//!
//! `timestamp` is a decimal string. `kid` is optional; records without it are
//! opened with the provider's current key.

use crate::envelope::WireEnvelope;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// An envelope as carried on a message queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePayload {
    /// Base64 `nonce || ciphertext`.
    pub value: String,
    /// Seal time in ms, as a decimal string.
    pub timestamp: String,
    /// Key id the value was sealed under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl QueuePayload {
    /// Wrap an envelope.
    pub fn from_envelope(envelope: &WireEnvelope) -> Self {
        Self {
            value: envelope.to_combined_base64(),
            timestamp: envelope.timestamp().to_string(),
            kid: Some(envelope.key_id().to_string()),
        }
    }

    /// Seal time in ms.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedEnvelope` if the timestamp is not a decimal integer.
    pub fn timestamp_ms(&self) -> Result<u64> {
        self.timestamp
            .trim()
            .parse()
            .map_err(|_| Error::MalformedEnvelope(format!("invalid timestamp {:?}", self.timestamp)))
    }

    /// Unwrap the envelope, using `default_kid` when the record has no kid.
    pub fn to_envelope(&self, default_kid: &str) -> Result<WireEnvelope> {
        let kid = self.kid.as_deref().unwrap_or(default_kid);
        WireEnvelope::from_combined_base64(&self.value, kid, self.timestamp_ms()?)
    }

    /// Decode from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::MalformedEnvelope(e.to_string()))
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{EnvelopeCodec, SealingKey};
    use serde_json::json;
    use std::sync::Arc;
    use wb_crypto::CipherSuite;
    use wb_keys::mock::ManualClock;
    use zeroize::Zeroizing;

    const TS: u64 = 1_700_000_000_000;

    fn envelope() -> WireEnvelope {
        let codec =
            EnvelopeCodec::with_clock(CipherSuite::XChaCha20Poly1305, Arc::new(ManualClock::new(TS)));
        codec
            .seal(b"queued", &SealingKey::new("env-1", Zeroizing::new([1u8; 32])))
            .unwrap()
    }

    #[test]
    fn test_payload_shape() {
        let payload = QueuePayload::from_envelope(&envelope());
        let value: serde_json::Value = serde_json::from_str(&payload.to_json().unwrap()).unwrap();

        assert_eq!(value["timestamp"], json!(TS.to_string()));
        assert_eq!(value["kid"], json!("env-1"));
        assert!(value["value"].is_string());
    }

    #[test]
    fn test_payload_back_to_envelope() {
        let envelope = envelope();
        let payload = QueuePayload::from_envelope(&envelope);
        assert_eq!(payload.to_envelope("ignored").unwrap(), envelope);
    }

    #[test]
    fn test_payload_without_kid_uses_default() {
        let envelope = envelope();
        let json = format!(
            r#"{{"value":"{}","timestamp":"{}"}}"#,
            envelope.to_combined_base64(),
            TS
        );
        let payload = QueuePayload::from_json(&json).unwrap();
        assert_eq!(payload.kid, None);
        assert_eq!(payload.to_envelope("env-1").unwrap(), envelope);
    }

    #[test]
    fn test_payload_bad_timestamp() {
        let mut payload = QueuePayload::from_envelope(&envelope());
        payload.timestamp = "12:00".into();
        assert!(matches!(
            payload.to_envelope("k"),
            Err(Error::MalformedEnvelope(_))
        ));
    }
}
