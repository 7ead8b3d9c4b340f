//! Store error types.
//!
//! - `NotFound`: the current device has no identity yet
//! - `Serialization`: a stored value could not be encoded or decoded
//! - `Io`: the underlying storage system failed

use thiserror::Error;

/// Errors that can occur during store operations
///
/// Absent sessions, bundles and device lists are not errors; lookups return
/// `None` or an empty list for those.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Required record does not exist
    #[error("not found: {0}")]
    NotFound(&'static str),

    /// Serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error (file system, database, etc.)
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}
