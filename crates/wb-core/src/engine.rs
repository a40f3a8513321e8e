//! Protocol engine.
//!
//! Ties key provider, session deriver, envelope codec, replay guard and batch
//! coordinator together. Sessions are passed explicitly to every call; the
//! engine keeps no per-request state besides the replay guard.
//!
//! Key selection:
//! - sealing with a session uses its `tx` key and kid `"session"`
//! - sealing without one uses the provider's current record
//! - opening a `"session"` envelope requires a session and uses its `rx` key
//! - opening any other envelope resolves its kid through the provider

use crate::batch::{BatchConfig, BatchCoordinator, BatchOutcome};
use crate::envelope::{EnvelopeCodec, SealingKey, WireEnvelope};
use crate::handshake::{HandshakeHeaders, HandshakeRequest, PublicKeyInfo};
use crate::queue::QueuePayload;
use crate::replay::{ReplayConfig, ReplayGuard};
use crate::session::{SessionDeriver, SessionKeys};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use wb_crypto::{CipherSuite, KxKdf, SuiteRegistry};
use wb_keys::env::replay_window_from;
use wb_keys::{Clock, KeyProvider, SystemClock};
use zeroize::Zeroizing;

/// Environment variable naming the cipher suite.
pub const CIPHER_SUITE_VAR: &str = "WIREBOX_CIPHER_SUITE";
/// Environment variable naming the session KDF.
pub const KX_KDF_VAR: &str = "WIREBOX_KX_KDF";
pub use wb_keys::env::REPLAY_WINDOW_VAR;
/// Environment variable holding the handshake HMAC secret.
pub const HANDSHAKE_SECRET_VAR: &str = "WIREBOX_HANDSHAKE_SECRET";
/// Environment variable controlling metadata binding (`true`/`false`).
pub const BIND_METADATA_VAR: &str = "WIREBOX_BIND_METADATA";

/// Engine configuration.
#[derive(Clone)]
pub struct EngineConfig {
    /// AEAD suite for envelopes.
    pub suite: CipherSuite,
    /// KDF for session keys.
    pub kx_kdf: KxKdf,
    /// Authenticate `kid` and `ts` as associated data. On by default; turning
    /// it off leaves `ts` unauthenticated and is only meant for peers that
    /// cannot bind it.
    pub bind_metadata: bool,
    /// Replay guard settings.
    pub replay: ReplayConfig,
    /// Batch settings.
    pub batch: BatchConfig,
    /// Pre-shared secret for handshake header signatures.
    pub handshake_secret: Option<Zeroizing<Vec<u8>>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let suite = CipherSuite::default();
        Self {
            suite,
            kx_kdf: KxKdf::default(),
            bind_metadata: suite.supports_aad(),
            replay: ReplayConfig::default(),
            batch: BatchConfig::default(),
            handshake_secret: None,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("suite", &self.suite)
            .field("kx_kdf", &self.kx_kdf)
            .field("bind_metadata", &self.bind_metadata)
            .field("replay", &self.replay)
            .field("batch", &self.batch)
            .field("handshake_secret", &self.handshake_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl EngineConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// - `Error::UnsupportedSuite` for unknown or compiled-out suites
    /// - `Error::Config` for unparseable values
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup(CIPHER_SUITE_VAR) {
            config.suite = SuiteRegistry::builtin().require(&name)?;
            config.bind_metadata = config.suite.supports_aad();
        }

        if let Some(name) = lookup(KX_KDF_VAR) {
            config.kx_kdf = KxKdf::from_name(&name)
                .ok_or_else(|| Error::Config(format!("unknown {}: {:?}", KX_KDF_VAR, name)))?;
        }

        if let Some(window) = replay_window_from(&lookup)? {
            config.replay.window = window;
        }

        if let Some(raw) = lookup(BIND_METADATA_VAR) {
            config.bind_metadata = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(Error::Config(format!(
                        "invalid {}: {:?}",
                        BIND_METADATA_VAR, raw
                    )))
                }
            };
        }

        if let Some(secret) = lookup(HANDSHAKE_SECRET_VAR) {
            if secret.is_empty() {
                return Err(Error::Config(format!("{} is empty", HANDSHAKE_SECRET_VAR)));
            }
            config.handshake_secret = Some(Zeroizing::new(secret.into_bytes()));
        }

        Ok(config)
    }
}

/// The protocol engine.
pub struct Engine {
    config: EngineConfig,
    provider: Arc<dyn KeyProvider>,
    codec: EnvelopeCodec,
    deriver: SessionDeriver,
    guard: ReplayGuard,
    batch: BatchCoordinator,
}

impl Engine {
    /// Engine on the system clock.
    pub fn new(config: EngineConfig, provider: Arc<dyn KeyProvider>) -> Result<Self> {
        Self::with_clock(config, provider, Arc::new(SystemClock))
    }

    /// Engine on an explicit clock.
    ///
    /// # Errors
    ///
    /// - `Error::UnsupportedSuite` if the configured suite is not compiled in,
    ///   or metadata binding is requested for a suite without associated data
    /// - `Error::Config` if the provider evicts retired keys sooner than the
    ///   replay window accepts envelopes sealed under them
    pub fn with_clock(
        config: EngineConfig,
        provider: Arc<dyn KeyProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let suite = SuiteRegistry::builtin().ensure(config.suite)?;

        if let Some(retention) = provider.retention() {
            if retention < config.replay.window {
                return Err(Error::Config(format!(
                    "key retention {:?} is shorter than the replay window {:?}",
                    retention, config.replay.window
                )));
            }
        }

        let codec =
            EnvelopeCodec::with_clock(suite, clock.clone()).bind_metadata(config.bind_metadata)?;

        tracing::info!(
            "Engine ready: suite={} kdf={} bind_metadata={} replay_window={:?}",
            suite.name(),
            config.kx_kdf.name(),
            config.bind_metadata,
            config.replay.window
        );

        Ok(Self {
            deriver: SessionDeriver::new(config.kx_kdf),
            guard: ReplayGuard::with_clock(config.replay.clone(), clock),
            batch: BatchCoordinator::new(codec.clone(), config.batch.clone()),
            codec,
            provider,
            config,
        })
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Key provider.
    pub fn provider(&self) -> &Arc<dyn KeyProvider> {
        &self.provider
    }

    /// Replay guard.
    pub fn replay_guard(&self) -> &ReplayGuard {
        &self.guard
    }

    /// Public half of the current key.
    pub fn public_key(&self) -> Result<PublicKeyInfo> {
        PublicKeyInfo::from_record(&*self.provider.current_key()?)
    }

    /// Rotate keys and expose the new public key.
    pub fn rotate_keys(&self) -> Result<PublicKeyInfo> {
        PublicKeyInfo::from_record(&*self.provider.rotate_keys()?)
    }

    /// Accept a handshake.
    ///
    /// The `(timestamp, client key)` pair goes through the replay guard, so a
    /// given ephemeral key starts at most one session per window.
    pub fn accept_handshake(&self, request: &HandshakeRequest) -> Result<SessionKeys> {
        let result = self
            .guard
            .check(request.timestamp, &request.client_public)
            .and_then(|()| {
                self.deriver.derive_with_provider(
                    self.provider.as_ref(),
                    &request.client_public,
                    request.timestamp,
                )
            });

        if let Err(e) = &result {
            tracing::warn!("Handshake rejected: {}", e);
        }
        result
    }

    /// Verify handshake headers and accept the handshake.
    pub fn accept_headers(&self, headers: &HandshakeHeaders) -> Result<SessionKeys> {
        let secret = self.config.handshake_secret.as_deref().map(Vec::as_slice);
        let request = headers.verify(secret).map_err(|e| {
            tracing::warn!("Handshake headers rejected: {}", e);
            e
        })?;
        self.accept_handshake(&request)
    }

    /// Seal `plaintext` under the session or the current key.
    pub fn seal(&self, plaintext: &[u8], session: Option<&SessionKeys>) -> Result<WireEnvelope> {
        self.codec.seal(plaintext, &self.sealing_key(session)?)
    }

    /// Open an envelope, rejecting replays.
    ///
    /// The replay check runs after authentication, so a forged envelope
    /// cannot burn the nonce of a genuine one.
    pub fn open(
        &self,
        envelope: &WireEnvelope,
        session: Option<&SessionKeys>,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let plaintext = self.open_unguarded(envelope, session)?;
        self.guard.check(envelope.timestamp(), envelope.nonce())?;
        Ok(plaintext)
    }

    /// Serialize `value` as JSON and seal it.
    pub fn seal_json<T: Serialize>(
        &self,
        value: &T,
        session: Option<&SessionKeys>,
    ) -> Result<WireEnvelope> {
        let plaintext = Zeroizing::new(
            serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))?,
        );
        self.seal(&plaintext, session)
    }

    /// Open an envelope and deserialize its JSON plaintext.
    pub fn open_json<T: DeserializeOwned>(
        &self,
        envelope: &WireEnvelope,
        session: Option<&SessionKeys>,
    ) -> Result<T> {
        let plaintext = self.open(envelope, session)?;
        serde_json::from_slice(&plaintext).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Seal many plaintexts under one key, preserving order.
    pub fn seal_batch<P>(
        &self,
        plaintexts: &[P],
        session: Option<&SessionKeys>,
    ) -> Result<Vec<WireEnvelope>>
    where
        P: AsRef<[u8]> + Sync,
    {
        let key = self.sealing_key(session)?;
        self.batch.seal_all(plaintexts, &key)
    }

    /// Open many envelopes, isolating failures (replay included) per item.
    pub fn open_batch(
        &self,
        envelopes: &[WireEnvelope],
        session: Option<&SessionKeys>,
    ) -> BatchOutcome<Zeroizing<Vec<u8>>> {
        let outcome = self
            .batch
            .map_isolated(envelopes, |_, envelope| self.open(envelope, session));
        tracing::debug!(
            "Opened batch: {}/{} succeeded",
            outcome.success_count(),
            outcome.len()
        );
        outcome
    }

    /// Seal a JSON record into a queue payload under the current key.
    pub fn seal_queue(&self, value: &serde_json::Value) -> Result<QueuePayload> {
        Ok(QueuePayload::from_envelope(&self.seal_json(value, None)?))
    }

    /// Open a queue payload into a JSON record.
    ///
    /// Queue records are not replay-gated: delivery is at-least-once and a
    /// record may wait on the queue longer than the replay window.
    pub fn open_queue(&self, payload: &QueuePayload) -> Result<serde_json::Value> {
        let envelope = match &payload.kid {
            Some(kid) => payload.to_envelope(kid)?,
            None => payload.to_envelope(self.provider.current_key()?.id())?,
        };
        let plaintext = self.open_unguarded(&envelope, None)?;
        serde_json::from_slice(&plaintext).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Seal JSON records into queue payloads under one key.
    pub fn seal_records(&self, values: &[serde_json::Value]) -> Result<Vec<QueuePayload>> {
        let key = self.sealing_key(None)?;
        let plaintexts = values
            .iter()
            .map(|value| {
                serde_json::to_vec(value)
                    .map(Zeroizing::new)
                    .map_err(|e| Error::Serialization(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(self
            .batch
            .seal_all(&plaintexts, &key)?
            .iter()
            .map(QueuePayload::from_envelope)
            .collect())
    }

    /// Open queue payloads, reporting failed records per item.
    pub fn open_records(&self, payloads: &[QueuePayload]) -> BatchOutcome<serde_json::Value> {
        self.batch
            .map_isolated(payloads, |_, payload| self.open_queue(payload))
    }

    fn sealing_key(&self, session: Option<&SessionKeys>) -> Result<SealingKey> {
        match session {
            Some(session) => Ok(SealingKey::session_tx(session)),
            None => SealingKey::from_record(&*self.provider.current_key()?),
        }
    }

    fn opening_key(
        &self,
        envelope: &WireEnvelope,
        session: Option<&SessionKeys>,
    ) -> Result<SealingKey> {
        if envelope.is_session() {
            return session.map(SealingKey::session_rx).ok_or_else(|| {
                Error::KeyUnavailable("session envelope without an active session".into())
            });
        }

        let record = self
            .provider
            .get_key(envelope.key_id())?
            .ok_or_else(|| Error::UnknownKeyId(envelope.key_id().to_string()))?;
        SealingKey::from_record(&record)
    }

    fn open_unguarded(
        &self,
        envelope: &WireEnvelope,
        session: Option<&SessionKeys>,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let key = self.opening_key(envelope, session)?;
        self.codec.open(envelope, &key)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}
