//! Core protocol engine for wirebox end-to-end encrypted sessions.
//!
//! This crate implements the session protocol on top of `wb-crypto` and
//! `wb-keys`:
//! - Session key derivation from an ephemeral X25519 handshake
//! - Wire envelopes ("wire boxes") in JSON, binary and combined forms
//! - Replay protection bounding message age and rejecting reused nonces
//! - Batch sealing/opening with per-item failure isolation
//! - Handshake headers with optional HMAC signatures
//! - Message-queue payloads
//!
//! Transport, routing and queue wiring are left to the host; they interact
//! with the core through `Engine`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod batch;
pub mod client;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod handshake;
pub mod queue;
pub mod replay;
pub mod session;

pub use batch::{BatchConfig, BatchCoordinator, BatchOutcome};
pub use client::ClientHandshake;
pub use engine::{Engine, EngineConfig};
pub use envelope::{is_wire_box, EnvelopeCodec, SealingKey, WireEnvelope};
pub use error::{Error, ErrorCode, FailureScope, ReplayReason, Result};
pub use handshake::{HandshakeHeaders, HandshakeRequest, PublicKeyInfo};
pub use queue::QueuePayload;
pub use replay::{ReplayConfig, ReplayGuard};
pub use session::{Role, SessionDeriver, SessionKeys, SESSION_KEY_ID};
