//! Wire format errors

use thiserror::Error;

/// Result alias for wire format operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// A message or document violates the wire format
///
/// Every variant is specific to a single message: the caller drops that
/// message and keeps the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A field tag did not match the one expected at this position
    #[error("unexpected tag for {field}: expected {expected:#04x}, got {actual:#04x}")]
    UnexpectedTag {
        /// Field being decoded
        field: &'static str,
        /// Tag required at this position
        expected: u8,
        /// Tag found in the buffer
        actual: u8,
    },

    /// Leading version byte is not one we speak
    #[error("unsupported protocol version: {0:#04x}")]
    UnsupportedVersion(u8),

    /// Buffer ended before the field was complete
    #[error("truncated {field}: need {needed} bytes, have {available}")]
    Truncated {
        /// Field being decoded
        field: &'static str,
        /// Bytes required
        needed: usize,
        /// Bytes remaining in the buffer
        available: usize,
    },

    /// A length prefix exceeds [`crate::MAX_FIELD_SIZE`]
    #[error("{field} too large: {size} bytes (max {max})")]
    FieldTooLarge {
        /// Field being encoded or decoded
        field: &'static str,
        /// Declared or actual size
        size: usize,
        /// Upper bound
        max: usize,
    },

    /// Bytes remain after the last field
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),

    /// Wire payload is shorter than its trailing MAC
    #[error("payload of {0} bytes cannot carry a MAC")]
    MissingMac(usize),

    /// CBOR document could not be encoded
    #[error("CBOR encode failed: {0}")]
    CborEncode(String),

    /// CBOR document could not be decoded
    #[error("CBOR decode failed: {0}")]
    CborDecode(String),
}
