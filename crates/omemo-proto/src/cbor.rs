//! CBOR helpers for the document types

use serde::{Serialize, de::DeserializeOwned};

use crate::errors::{ProtocolError, Result};

/// Upper bound on an encoded document (16 MiB)
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
    Ok(buf)
}

/// Size check happens before the CBOR parser sees the input. Exactly one
/// document is accepted; anything after it is `TrailingBytes`.
pub(crate) fn decode<T: DeserializeOwned>(field: &'static str, bytes: &[u8]) -> Result<T> {
    if bytes.len() > MAX_DOCUMENT_SIZE {
        return Err(ProtocolError::FieldTooLarge {
            field,
            size: bytes.len(),
            max: MAX_DOCUMENT_SIZE,
        });
    }

    let mut reader = bytes;
    let value = ciborium::de::from_reader(&mut reader)
        .map_err(|e| ProtocolError::CborDecode(e.to_string()))?;

    if !reader.is_empty() {
        return Err(ProtocolError::TrailingBytes(reader.len()));
    }
    Ok(value)
}
