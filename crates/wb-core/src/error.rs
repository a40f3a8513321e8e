//! Error types for protocol operations.

use std::fmt;
use thiserror::Error;

/// Result type alias for protocol operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Why the replay guard rejected a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayReason {
    /// Timestamp is further from now than the window allows.
    OutsideWindow {
        /// Absolute distance between the timestamp and now (ms).
        skew_ms: u64,
    },
    /// The (timestamp, token) pair was already accepted.
    Duplicate,
}

impl fmt::Display for ReplayReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutsideWindow { skew_ms } => write!(f, "timestamp outside window ({} ms)", skew_ms),
            Self::Duplicate => f.write_str("duplicate token"),
        }
    }
}

/// Protocol operation errors.
#[derive(Debug, Error)]
pub enum Error {
    /// No key is available to seal or open with.
    #[error("Key unavailable: {0}")]
    KeyUnavailable(String),

    /// Envelope names a key id that cannot be resolved.
    #[error("Unknown key id: {0}")]
    UnknownKeyId(String),

    /// Peer public key is malformed or a low-order point.
    #[error("Invalid peer key: {0}")]
    InvalidPeerKey(String),

    /// Envelope structure or encoding is inconsistent.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// AEAD tag verification failed (wrong key or tampered data).
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Replay guard rejected the message.
    #[error("Replay rejected: {0}")]
    ReplayRejected(ReplayReason),

    /// One item of a batch failed; siblings are unaffected.
    #[error("Batch item {index} failed: {source}")]
    BatchItemFailed {
        /// Position of the item in the batch.
        index: usize,
        /// Underlying failure.
        source: Box<Error>,
    },

    /// Cipher suite is unknown or compiled out.
    #[error("Unsupported cipher suite: {0}")]
    UnsupportedSuite(String),

    /// Handshake headers or payload are invalid.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Payload (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker failure while processing a batch.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Key provider error.
    #[error("Key provider error: {0}")]
    Keys(wb_keys::Error),

    /// Cryptographic error.
    #[error("Crypto error: {0}")]
    Crypto(wb_crypto::Error),
}

impl From<wb_crypto::Error> for Error {
    fn from(err: wb_crypto::Error) -> Self {
        match err {
            wb_crypto::Error::Decryption => Self::AuthenticationFailed,
            wb_crypto::Error::UnsupportedSuite(name) => Self::UnsupportedSuite(name),
            other => Self::Crypto(other),
        }
    }
}

impl From<wb_keys::Error> for Error {
    fn from(err: wb_keys::Error) -> Self {
        match err {
            wb_keys::Error::KeyUnavailable(msg) => Self::KeyUnavailable(msg),
            wb_keys::Error::Config(msg) => Self::Config(msg),
            wb_keys::Error::Crypto(inner) => Self::from(inner),
            other => Self::Keys(other),
        }
    }
}

/// How far a failure reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    /// Only the message being processed is lost.
    Message,
    /// No message in the batch can succeed.
    Batch,
}

impl Error {
    /// Wire-safe error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MalformedEnvelope(_)
            | Self::AuthenticationFailed
            | Self::ReplayRejected(_)
            | Self::UnknownKeyId(_)
            | Self::Serialization(_) => ErrorCode::MessageRejected,
            Self::KeyUnavailable(_) | Self::Keys(_) => ErrorCode::KeyUnavailable,
            Self::InvalidPeerKey(_) => ErrorCode::InvalidPeerKey,
            Self::InvalidHandshake(_) => ErrorCode::InvalidHandshake,
            Self::UnsupportedSuite(_) | Self::Config(_) => ErrorCode::UnsupportedSuite,
            Self::BatchItemFailed { source, .. } => source.code(),
            Self::Internal(_) | Self::Crypto(_) => ErrorCode::Internal,
        }
    }

    /// Whether this failure is fatal to one message or to the whole batch.
    pub fn scope(&self) -> FailureScope {
        match self {
            Self::KeyUnavailable(_)
            | Self::Keys(_)
            | Self::UnsupportedSuite(_)
            | Self::Config(_) => FailureScope::Batch,
            Self::BatchItemFailed { source, .. } => source.scope(),
            _ => FailureScope::Message,
        }
    }

    /// Whether this is a replay rejection, directly or inside a batch item.
    pub fn is_replay(&self) -> bool {
        match self {
            Self::ReplayRejected(_) => true,
            Self::BatchItemFailed { source, .. } => source.is_replay(),
            _ => false,
        }
    }

    pub(crate) fn batch_item(index: usize, source: Error) -> Self {
        Self::BatchItemFailed {
            index,
            source: Box::new(source),
        }
    }
}

/// Wire-safe error codes.
///
/// Authentication, malformation and replay failures share `MessageRejected`
/// so a peer cannot probe which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    /// Message rejected (0x01).
    MessageRejected = 0x01,
    /// Key unavailable (0x02).
    KeyUnavailable = 0x02,
    /// Invalid peer key (0x03).
    InvalidPeerKey = 0x03,
    /// Invalid handshake (0x04).
    InvalidHandshake = 0x04,
    /// Unsupported suite or configuration (0x05).
    UnsupportedSuite = 0x05,
    /// Internal error (0x06).
    Internal = 0x06,
}

impl ErrorCode {
    /// Convert to wire format.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Convert from wire format.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::MessageRejected),
            0x02 => Some(Self::KeyUnavailable),
            0x03 => Some(Self::InvalidPeerKey),
            0x04 => Some(Self::InvalidHandshake),
            0x05 => Some(Self::UnsupportedSuite),
            0x06 => Some(Self::Internal),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_roundtrip() {
        for value in 0x01..=0x06 {
            let code = ErrorCode::from_u8(value).unwrap();
            assert_eq!(code.to_u8(), value);
        }
        assert_eq!(ErrorCode::from_u8(0x00), None);
        assert_eq!(ErrorCode::from_u8(0x07), None);
    }

    /// Auth, malformation and replay failures are indistinguishable on the wire.
    #[test]
    fn test_rejections_share_code() {
        let errors = [
            Error::AuthenticationFailed,
            Error::MalformedEnvelope("short".into()),
            Error::ReplayRejected(ReplayReason::Duplicate),
            Error::ReplayRejected(ReplayReason::OutsideWindow { skew_ms: 40_000 }),
        ];
        for err in errors {
            assert_eq!(err.code(), ErrorCode::MessageRejected);
        }
    }

    #[test]
    fn test_failure_scope() {
        assert_eq!(Error::AuthenticationFailed.scope(), FailureScope::Message);
        assert_eq!(
            Error::KeyUnavailable("none".into()).scope(),
            FailureScope::Batch
        );
        assert_eq!(
            Error::batch_item(2, Error::AuthenticationFailed).scope(),
            FailureScope::Message
        );
        assert_eq!(
            Error::batch_item(0, Error::UnsupportedSuite("Kyber".into())).scope(),
            FailureScope::Batch
        );
    }

    #[test]
    fn test_crypto_error_mapping() {
        assert!(matches!(
            Error::from(wb_crypto::Error::Decryption),
            Error::AuthenticationFailed
        ));
        assert!(matches!(
            Error::from(wb_keys::Error::KeyUnavailable("x".into())),
            Error::KeyUnavailable(_)
        ));
        assert!(matches!(
            Error::from(wb_keys::Error::Crypto(wb_crypto::Error::Decryption)),
            Error::AuthenticationFailed
        ));
    }

    #[test]
    fn test_is_replay() {
        assert!(Error::ReplayRejected(ReplayReason::Duplicate).is_replay());
        assert!(Error::batch_item(1, Error::ReplayRejected(ReplayReason::Duplicate)).is_replay());
        assert!(!Error::AuthenticationFailed.is_replay());
    }
}
