//! Normal ratchet message

use bytes::BufMut;

use crate::{
    PROTOCOL_VERSION,
    codec::{OlmReader, OlmWriter},
    errors::{ProtocolError, Result},
    tag,
};

/// Length of the truncated MAC that follows every encoded `OlmMessage`
pub const MAC_LENGTH: usize = 8;

/// A message encrypted under an established (or pending) ratchet session
///
/// # Invariants
///
/// - `version` is [`PROTOCOL_VERSION`] for every decoded message.
/// - `chain_index` is the sender's position in its current sending chain,
///   so the receiver can skip ahead to the matching message key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OlmMessage {
    /// Protocol version byte
    pub version: u8,
    /// Sender's current ratchet public key
    pub ratchet_key: Vec<u8>,
    /// Index of the message key in the sender's chain
    pub chain_index: u32,
    /// AES-CBC ciphertext of the payload
    pub ciphertext: Vec<u8>,
}

impl OlmMessage {
    /// Message with the current protocol version.
    pub fn new(ratchet_key: impl Into<Vec<u8>>, chain_index: u32, ciphertext: Vec<u8>) -> Self {
        Self { version: PROTOCOL_VERSION, ratchet_key: ratchet_key.into(), chain_index, ciphertext }
    }

    /// Encode into `dst`.
    ///
    /// # Errors
    ///
    /// - `FieldTooLarge` if the ratchet key or ciphertext exceeds
    ///   [`crate::MAX_FIELD_SIZE`]
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let mut writer = OlmWriter::new(dst);
        writer.put_version(self.version);
        writer.put_tag(tag::RATCHET_KEY);
        writer.put_string("ratchet key", &self.ratchet_key)?;
        writer.put_tag(tag::CHAIN_INDEX);
        writer.put_u32(self.chain_index);
        writer.put_tag(tag::CIPHERTEXT);
        writer.put_string("ciphertext", &self.ciphertext)?;
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
        // version + 3 tags + 2 length prefixes + index
        1 + 3 + 8 + 4 + self.ratchet_key.len() + self.ciphertext.len()
    }

    /// Decode a complete message (without its trailing MAC).
    ///
    /// # Errors
    ///
    /// - `UnsupportedVersion`, `UnexpectedTag`, `Truncated`, `FieldTooLarge`
    ///   or `TrailingBytes` on any deviation from the layout
    ///
    /// # Security
    ///
    /// Structural validation only. The result is untrusted until the MAC
    /// that accompanied it has been verified with the derived message keys.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = OlmReader::new(bytes);

        let version = reader.read_version()?;
        reader.expect_tag("ratchet key", tag::RATCHET_KEY)?;
        let ratchet_key = reader.read_string("ratchet key")?;
        reader.expect_tag("chain index", tag::CHAIN_INDEX)?;
        let chain_index = reader.read_u32("chain index")?;
        reader.expect_tag("ciphertext", tag::CIPHERTEXT)?;
        let ciphertext = reader.read_string("ciphertext")?;
        reader.finish()?;

        Ok(Self { version, ratchet_key, chain_index, ciphertext })
    }
}

/// Split a wire payload `encoded message ‖ mac` into its two parts.
///
/// # Errors
///
/// - `MissingMac` if the payload is shorter than [`MAC_LENGTH`]
pub fn split_mac(payload: &[u8]) -> Result<(&[u8], [u8; MAC_LENGTH])> {
    let Some(body_len) = payload.len().checked_sub(MAC_LENGTH) else {
        return Err(ProtocolError::MissingMac(payload.len()));
    };

    let (body, tail) = payload.split_at(body_len);
    let mut mac = [0u8; MAC_LENGTH];
    mac.copy_from_slice(tail);
    Ok((body, mac))
}
