//! Handshake payloads and headers.
//!
//! A client starts a session by sending its ephemeral X25519 public key and a
//! millisecond timestamp, either as a JSON body `{ "epk": b64, "ts": ms }` or
//! as headers:
//!
//! | header         | value                                          |
//! |----------------|------------------------------------------------|
//! | `x-client-epk` | base64 ephemeral public key                    |
//! | `x-client-ts`  | decimal timestamp (ms)                         |
//! | `x-client-sig` | base64 HMAC-SHA256(secret, `"{ts}.{epk}"`), optional |
//!
//! The signature covers the header values exactly as sent.

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use wb_crypto::kex::x25519::parse_public_key;
use wb_keys::KeyRecord;

type HmacSha256 = Hmac<Sha256>;

/// Ephemeral public key header.
pub const HEADER_EPK: &str = "x-client-epk";
/// Timestamp header.
pub const HEADER_TS: &str = "x-client-ts";
/// Signature header.
pub const HEADER_SIG: &str = "x-client-sig";

/// A decoded handshake: the client's ephemeral key and its timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Client ephemeral public key.
    pub client_public: [u8; 32],
    /// Handshake timestamp (ms since epoch).
    pub timestamp: u64,
}

impl HandshakeRequest {
    /// Decode a base64 key and a timestamp.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidHandshake` if `epk` is not base64
    /// - `Error::InvalidPeerKey` if the decoded key is not 32 bytes
    pub fn from_base64(epk: &str, timestamp: u64) -> Result<Self> {
        let bytes = STANDARD
            .decode(epk.trim())
            .map_err(|e| Error::InvalidHandshake(format!("epk: invalid base64: {}", e)))?;
        let client_public =
            parse_public_key(&bytes).map_err(|e| Error::InvalidPeerKey(e.to_string()))?;

        Ok(Self {
            client_public,
            timestamp,
        })
    }

    /// Decode a JSON body `{ "epk": b64, "ts": ms }`.
    ///
    /// `ts` may be a number or a decimal string.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let epk = value
            .get("epk")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| Error::InvalidHandshake("missing epk".into()))?;

        let timestamp = match value.get("ts") {
            Some(serde_json::Value::Number(n)) => n.as_u64(),
            Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| Error::InvalidHandshake("missing or invalid ts".into()))?;

        Self::from_base64(epk, timestamp)
    }

    /// Encode as a JSON body.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "epk": STANDARD.encode(self.client_public),
            "ts": self.timestamp,
        })
    }
}

/// Raw handshake header values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeHeaders {
    /// `x-client-epk` value.
    pub epk: String,
    /// `x-client-ts` value.
    pub ts: String,
    /// `x-client-sig` value.
    pub sig: Option<String>,
}

impl HandshakeHeaders {
    /// Build headers for a handshake, signing them when `secret` is given.
    pub fn build(client_public: &[u8; 32], timestamp: u64, secret: Option<&[u8]>) -> Result<Self> {
        let epk = STANDARD.encode(client_public);
        let ts = timestamp.to_string();
        let sig = secret.map(|secret| sign(secret, &ts, &epk)).transpose()?;

        Ok(Self { epk, ts, sig })
    }

    /// Collect headers through a lookup (names are lowercase).
    ///
    /// Returns `Ok(None)` when the request carries no handshake at all.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHandshake` if only one of epk and ts is present.
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        match (lookup(HEADER_EPK), lookup(HEADER_TS)) {
            (None, None) => Ok(None),
            (Some(epk), Some(ts)) => Ok(Some(Self {
                epk,
                ts,
                sig: lookup(HEADER_SIG),
            })),
            (Some(_), None) => Err(Error::InvalidHandshake(format!("missing {}", HEADER_TS))),
            (None, Some(_)) => Err(Error::InvalidHandshake(format!("missing {}", HEADER_EPK))),
        }
    }

    /// Header name/value pairs to attach to a request.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![(HEADER_EPK, self.epk.clone()), (HEADER_TS, self.ts.clone())];
        if let Some(sig) = &self.sig {
            pairs.push((HEADER_SIG, sig.clone()));
        }
        pairs
    }

    /// Verify the headers and decode the handshake.
    ///
    /// With a `secret`, a valid signature is mandatory and compared in
    /// constant time. Without one, any signature is ignored.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidHandshake` on a bad timestamp or a missing or wrong
    ///   signature
    /// - `Error::InvalidPeerKey` if the key is not 32 bytes
    pub fn verify(&self, secret: Option<&[u8]>) -> Result<HandshakeRequest> {
        let timestamp: u64 = self
            .ts
            .trim()
            .parse()
            .map_err(|_| Error::InvalidHandshake(format!("invalid {}", HEADER_TS)))?;

        if let Some(secret) = secret {
            let sig = self
                .sig
                .as_deref()
                .ok_or_else(|| Error::InvalidHandshake(format!("missing {}", HEADER_SIG)))?;
            let sig = STANDARD
                .decode(sig.trim())
                .map_err(|_| Error::InvalidHandshake(format!("invalid {}", HEADER_SIG)))?;

            mac(secret, &self.ts, &self.epk)?
                .verify_slice(&sig)
                .map_err(|_| Error::InvalidHandshake("signature mismatch".into()))?;
        }

        HandshakeRequest::from_base64(&self.epk, timestamp)
    }
}

/// Base64 HMAC-SHA256 over `"{ts}.{epk}"`.
pub fn sign(secret: &[u8], ts: &str, epk: &str) -> Result<String> {
    Ok(STANDARD.encode(mac(secret, ts, epk)?.finalize().into_bytes()))
}

fn mac(secret: &[u8], ts: &str, epk: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| Error::Config("invalid handshake secret".into()))?;
    mac.update(ts.as_bytes());
    mac.update(b".");
    mac.update(epk.as_bytes());
    Ok(mac)
}

/// Public half of the current key, as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyInfo {
    /// Key id.
    pub kid: String,
    /// Base64 X25519 public key.
    #[serde(rename = "pub")]
    pub public: String,
}

impl PublicKeyInfo {
    /// Expose the public half of `record`.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyUnavailable` for symmetric records.
    pub fn from_record(record: &KeyRecord) -> Result<Self> {
        let public = record.public_key().ok_or_else(|| {
            Error::KeyUnavailable(format!("key {} has no public half", record.id()))
        })?;

        Ok(Self {
            kid: record.id().to_string(),
            public: STANDARD.encode(public),
        })
    }

    /// Decoded public key.
    pub fn public_key(&self) -> Result<[u8; 32]> {
        let bytes = STANDARD
            .decode(&self.public)
            .map_err(|e| Error::InvalidPeerKey(format!("invalid base64: {}", e)))?;
        parse_public_key(&bytes).map_err(|e| Error::InvalidPeerKey(e.to_string()))
    }
}
