//! Encrypted message envelope
//!
//! The message body is encrypted once under a fresh AES key. That key is
//! then sent to every recipient device through its own ratchet session, one
//! [`HeaderKey`] per device.

use serde::{Deserialize, Serialize};

use crate::{DeviceId, PeerId, cbor, errors::Result};

/// Body ciphertext plus one ratchet-encrypted copy of its key per device
///
/// # Invariants
///
/// - At most one `HeaderKey` per recipient device.
/// - `iv` is the CBC IV of `payload`; the key is never carried in the clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Device that produced the envelope
    pub sender_device_id: DeviceId,
    /// IV for the body cipher
    pub iv: [u8; 16],
    /// Per-device ratchet payloads carrying the body key
    pub keys: Vec<HeaderKey>,
    /// AES-CBC encrypted body
    pub payload: Vec<u8>,
}

/// Body key encrypted for one recipient device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderKey {
    /// Device this entry is addressed to
    pub recipient_device_id: DeviceId,
    /// `key` is an encoded `PreKeyMessage` rather than `OlmMessage ‖ mac`
    pub pre_key: bool,
    /// Ratchet payload
    pub key: Vec<u8>,
}

impl EncryptedEnvelope {
    /// Entry addressed to `device`, if any.
    pub fn key_for(&self, device: DeviceId) -> Option<&HeaderKey> {
        self.keys.iter().find(|key| key.recipient_device_id == device)
    }

    /// Encode as CBOR.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        cbor::encode(self)
    }

    /// Decode from CBOR.
    ///
    /// # Errors
    ///
    /// - `FieldTooLarge` if `bytes` exceeds [`crate::MAX_DOCUMENT_SIZE`]
    /// - `CborDecode` if the document is malformed
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        cbor::decode("envelope", bytes)
    }
}

/// Chat message as seen by the input/output filters
///
/// Outbound, `body` holds the plaintext until an output filter moves it into
/// `encrypted`. Inbound, an input filter does the reverse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sending peer
    pub from: PeerId,
    /// Recipient peers
    pub to: Vec<PeerId>,
    /// Plaintext body
    pub body: Option<String>,
    /// Encrypted form of the body
    pub encrypted: Option<EncryptedEnvelope>,
}

impl ChatMessage {
    /// Plaintext message from `from` to `to`.
    pub fn new(from: PeerId, to: Vec<PeerId>, body: impl Into<String>) -> Self {
        Self { from, to, body: Some(body.into()), encrypted: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProtocolError;

    fn envelope() -> EncryptedEnvelope {
        EncryptedEnvelope {
            sender_device_id: DeviceId(1),
            iv: [9u8; 16],
            keys: vec![
                HeaderKey { recipient_device_id: DeviceId(2), pre_key: true, key: vec![1, 2, 3] },
                HeaderKey { recipient_device_id: DeviceId(3), pre_key: false, key: vec![4] },
            ],
            payload: vec![0xaa; 32],
        }
    }

    #[test]
    fn cbor_roundtrip() {
        let original = envelope();
        let decoded = EncryptedEnvelope::from_bytes(&original.to_bytes().unwrap()).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn trailing_bytes_after_document_rejected() {
        let mut bytes = envelope().to_bytes().unwrap();
        bytes.extend_from_slice(&[0x00, 0x01]);

        assert!(matches!(
            EncryptedEnvelope::from_bytes(&bytes),
            Err(ProtocolError::TrailingBytes(2))
        ));
    }

    #[test]
    fn key_for_finds_recipient() {
        let envelope = envelope();

        assert!(envelope.key_for(DeviceId(2)).unwrap().pre_key);
        assert!(!envelope.key_for(DeviceId(3)).unwrap().pre_key);
        assert!(envelope.key_for(DeviceId(4)).is_none());
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = EncryptedEnvelope::from_bytes(&[0xff, 0x00, 0x13]).unwrap_err();
        assert!(matches!(err, crate::ProtocolError::CborDecode(_)));
    }
}
