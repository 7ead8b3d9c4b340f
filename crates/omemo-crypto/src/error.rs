//! Error types for cryptographic primitives

use thiserror::Error;

/// Errors from key agreement, key derivation and cipher operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material has the wrong length, is missing its private half, or
    /// produced a non-contributory (low-order) agreement
    #[error("invalid key: {reason}")]
    InvalidKey {
        /// What was wrong with the key
        reason: String,
    },

    /// Ciphertext is not block aligned or its PKCS7 padding is invalid
    #[error("invalid padding")]
    Padding,

    /// Requested HKDF output is longer than HKDF-SHA256 can produce
    #[error("invalid HKDF output length: {length}")]
    KdfLength {
        /// Requested output length
        length: usize,
    },
}

impl CryptoError {
    /// Shorthand for an [`CryptoError::InvalidKey`] with a reason.
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey { reason: reason.into() }
    }

    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// Invalid keys come from the peer and only poison the message they
    /// arrived in. Padding failures on authenticated data and KDF misuse
    /// indicate a protocol violation or bug.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Padding | Self::KdfLength { .. } => true,
            Self::InvalidKey { .. } => false,
        }
    }
}
