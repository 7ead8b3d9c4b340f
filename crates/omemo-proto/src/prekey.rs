//! Handshake ("pre-key") message
//!
//! Sent until the recipient has replied at least once. Carries the sender's
//! half of the triple Diffie-Hellman handshake alongside the first ratchet
//! message, so the recipient can build its session and decrypt in one step.

use bytes::BufMut;

use crate::{
    PROTOCOL_VERSION,
    codec::{OlmReader, OlmWriter},
    errors::Result,
    tag,
};

/// Handshake message wrapping an encoded `OlmMessage ‖ mac`
///
/// # Invariants
///
/// - `one_time_key` names a pre-key from the recipient's published bundle.
/// - `base_key` is the sender's ephemeral public key for the handshake.
/// - `message` is opaque here; the session layer splits off its MAC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreKeyMessage {
    /// Protocol version byte
    pub version: u8,
    /// Recipient's one-time pre-key chosen by the sender
    pub one_time_key: Vec<u8>,
    /// Sender's ephemeral public key
    pub base_key: Vec<u8>,
    /// Sender's long-term identity public key
    pub identity_key: Vec<u8>,
    /// Embedded `OlmMessage ‖ mac`
    pub message: Vec<u8>,
}

impl PreKeyMessage {
    /// Handshake message with the current protocol version.
    pub fn new(
        one_time_key: impl Into<Vec<u8>>,
        base_key: impl Into<Vec<u8>>,
        identity_key: impl Into<Vec<u8>>,
        message: Vec<u8>,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            one_time_key: one_time_key.into(),
            base_key: base_key.into(),
            identity_key: identity_key.into(),
            message,
        }
    }

    /// Encode into `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let mut writer = OlmWriter::new(dst);
        writer.put_version(self.version);
        writer.put_tag(tag::ONE_TIME_KEY);
        writer.put_string("one-time key", &self.one_time_key)?;
        writer.put_tag(tag::BASE_KEY);
        writer.put_string("base key", &self.base_key)?;
        writer.put_tag(tag::IDENTITY_KEY);
        writer.put_string("identity key", &self.identity_key)?;
        writer.put_tag(tag::MESSAGE);
        writer.put_string("message", &self.message)?;
        Ok(())
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Exact number of bytes [`Self::encode`] writes.
    pub fn encoded_len(&self) -> usize {
        // version + 4 tags + 4 length prefixes
        1 + 4 + 16
            + self.one_time_key.len()
            + self.base_key.len()
            + self.identity_key.len()
            + self.message.len()
    }

    /// Decode a complete handshake message.
    ///
    /// # Errors
    ///
    /// - `UnsupportedVersion`, `UnexpectedTag`, `Truncated`, `FieldTooLarge`
    ///   or `TrailingBytes` on any deviation from the layout
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = OlmReader::new(bytes);

        let version = reader.read_version()?;
        reader.expect_tag("one-time key", tag::ONE_TIME_KEY)?;
        let one_time_key = reader.read_string("one-time key")?;
        reader.expect_tag("base key", tag::BASE_KEY)?;
        let base_key = reader.read_string("base key")?;
        reader.expect_tag("identity key", tag::IDENTITY_KEY)?;
        let identity_key = reader.read_string("identity key")?;
        reader.expect_tag("message", tag::MESSAGE)?;
        let message = reader.read_string("message")?;
        reader.finish()?;

        Ok(Self { version, one_time_key, base_key, identity_key, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProtocolError;

    fn sample() -> PreKeyMessage {
        PreKeyMessage::new(vec![0x01], vec![0x02, 0x02], vec![0x03], vec![0xff])
    }

    #[test]
    fn layout_snapshot() {
        let bytes = sample().to_bytes().unwrap();

        insta::assert_snapshot!(
            hex::encode(&bytes),
            @"030a0100000001120200000002021a01000000032201000000ff"
        );
    }

    #[test]
    fn encoded_len_matches_output() {
        let message = sample();
        assert_eq!(message.to_bytes().unwrap().len(), message.encoded_len());
    }

    #[test]
    fn decode_roundtrip() {
        let message = PreKeyMessage::new([7u8; 32], [8u8; 32], [9u8; 32], vec![0xab; 60]);

        assert_eq!(PreKeyMessage::decode(&message.to_bytes().unwrap()).unwrap(), message);
    }

    #[test]
    fn plain_message_is_not_a_prekey_message() {
        let plain = crate::OlmMessage::new(vec![0x11; 32], 3, vec![0x22; 16]);
        let err = PreKeyMessage::decode(&plain.to_bytes().unwrap()).unwrap_err();

        // tags overlap for the first field, so the mismatch shows up later
        assert!(matches!(
            err,
            ProtocolError::UnexpectedTag { .. } | ProtocolError::Truncated { .. }
        ));
    }

    #[test]
    fn swapped_fields_are_rejected() {
        let mut bytes = sample().to_bytes().unwrap();
        // base key tag follows version, tag, length and the 1-byte key
        bytes[1 + 1 + 4 + 1] = tag::IDENTITY_KEY;

        assert!(matches!(
            PreKeyMessage::decode(&bytes),
            Err(ProtocolError::UnexpectedTag { field: "base key", .. })
        ));
    }
}
