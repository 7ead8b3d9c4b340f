//! Error types for sessions and the device manager

use omemo_crypto::CryptoError;
use omemo_proto::{DeviceId, ProtocolError};
use thiserror::Error;

use crate::store::StoreError;

/// Errors from a single ratchet operation
///
/// A failed operation never modifies the session state, so every variant is
/// scoped to the message that caused it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Wire format violation in the incoming message
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Key agreement or cipher failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Message could not be authenticated or decrypted
    ///
    /// Covers MAC mismatch, bad padding after a valid MAC, and messages whose
    /// key was already consumed (replays).
    #[error("decryption failed: {reason}")]
    Decryption {
        /// Why the message was rejected
        reason: String,
    },

    /// Incoming chain index is too far ahead of the receive chain
    #[error("too many skipped messages: at index {current}, message at {requested} (max skip {max})")]
    TooManySkipped {
        /// Current receive chain index
        current: u32,
        /// Chain index carried by the message
        requested: u32,
        /// Configured limit
        max: u32,
    },

    /// No sending chain exists and none can be derived yet
    #[error("session has no sending chain")]
    NoSendChain,

    /// Message arrived for a session that has never derived a receiving
    /// chain
    #[error("session has no receiving chain")]
    NoReceiveChain,

    /// Handshake message requested from a session that did not initiate
    #[error("session was not initialized as sender")]
    NotSender,

    /// Chain index would overflow u32
    #[error("chain index overflow")]
    ChainIndexOverflow,
}

impl SessionError {
    pub(crate) fn decryption(reason: impl Into<String>) -> Self {
        Self::Decryption { reason: reason.into() }
    }

    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// Non-fatal errors concern one untrusted message: drop it and keep the
    /// session. Fatal errors mean the session or the caller is misused.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Crypto(err) => err.is_fatal(),
            Self::NoSendChain | Self::NotSender | Self::ChainIndexOverflow => true,
            Self::Protocol(_)
            | Self::Decryption { .. }
            | Self::TooManySkipped { .. }
            | Self::NoReceiveChain => false,
        }
    }
}

/// Errors from the device manager
#[derive(Debug, Error)]
pub enum OmemoError {
    /// No session can be found or built for an incoming message
    ///
    /// The envelope has no key for this device, or it names a one-time
    /// pre-key we no longer hold and no session exists.
    #[error("no matching session for device {sender}: {reason}")]
    NoMatchingSession {
        /// Device that sent the envelope
        sender: DeviceId,
        /// What was missing
        reason: &'static str,
    },

    /// Ratchet operation failed
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Store failed; the operation was abandoned
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Envelope or bundle document is malformed
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Published bundle carries a malformed key
    #[error("invalid bundle: {0}")]
    InvalidBundle(#[source] CryptoError),

    /// Envelope body could not be decrypted with the recovered key
    #[error("payload decryption failed: {0}")]
    Payload(#[source] CryptoError),

    /// Decrypted body is not valid UTF-8 text
    #[error("decrypted body is not UTF-8")]
    InvalidBody,
}

impl OmemoError {
    /// Returns true if this error is fatal (unrecoverable)
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Session(err) => err.is_fatal(),
            Self::Store(_) => true,
            Self::NoMatchingSession { .. }
            | Self::Protocol(_)
            | Self::InvalidBundle(_)
            | Self::Payload(_)
            | Self::InvalidBody => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_level_errors_are_not_fatal() {
        assert!(!SessionError::decryption("MAC mismatch").is_fatal());
        assert!(!SessionError::TooManySkipped { current: 0, requested: 5000, max: 1000 }.is_fatal());
        assert!(!SessionError::Protocol(ProtocolError::TrailingBytes(1)).is_fatal());
    }

    #[test]
    fn misuse_is_fatal() {
        assert!(SessionError::NotSender.is_fatal());
        assert!(SessionError::NoSendChain.is_fatal());
        assert!(OmemoError::Store(StoreError::Io("disk".into())).is_fatal());
    }

    #[test]
    fn error_display() {
        let err = SessionError::TooManySkipped { current: 3, requested: 2000, max: 1000 };
        assert_eq!(
            err.to_string(),
            "too many skipped messages: at index 3, message at 2000 (max skip 1000)"
        );
    }
}
