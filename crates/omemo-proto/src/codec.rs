//! Tag/length/value primitives shared by both Olm message shapes

use bytes::{Buf, BufMut};

use crate::errors::{ProtocolError, Result};
use crate::tag::PROTOCOL_VERSION;

/// Upper bound on any length-prefixed field (1 MiB)
///
/// Checked before allocating so a forged length prefix cannot make the
/// decoder reserve gigabytes.
pub const MAX_FIELD_SIZE: usize = 1024 * 1024;

/// Writes Olm fields into any `BufMut`.
pub(crate) struct OlmWriter<'a, B: BufMut> {
    dst: &'a mut B,
}

impl<'a, B: BufMut> OlmWriter<'a, B> {
    pub(crate) fn new(dst: &'a mut B) -> Self {
        Self { dst }
    }

    pub(crate) fn put_version(&mut self, version: u8) {
        self.dst.put_u8(version);
    }

    pub(crate) fn put_tag(&mut self, tag: u8) {
        self.dst.put_u8(tag);
    }

    pub(crate) fn put_u32(&mut self, value: u32) {
        self.dst.put_u32_le(value);
    }

    /// Length-prefixed byte string.
    pub(crate) fn put_string(&mut self, field: &'static str, value: &[u8]) -> Result<()> {
        if value.len() > MAX_FIELD_SIZE {
            return Err(ProtocolError::FieldTooLarge {
                field,
                size: value.len(),
                max: MAX_FIELD_SIZE,
            });
        }

        // MAX_FIELD_SIZE fits in u32
        self.dst.put_u32_le(value.len() as u32);
        self.dst.put_slice(value);
        Ok(())
    }
}

/// Reads Olm fields from a byte slice, failing on anything out of place.
pub(crate) struct OlmReader<'a> {
    src: &'a [u8],
}

impl<'a> OlmReader<'a> {
    pub(crate) fn new(src: &'a [u8]) -> Self {
        Self { src }
    }

    fn ensure(&self, field: &'static str, needed: usize) -> Result<()> {
        if self.src.remaining() < needed {
            return Err(ProtocolError::Truncated {
                field,
                needed,
                available: self.src.remaining(),
            });
        }
        Ok(())
    }

    pub(crate) fn read_version(&mut self) -> Result<u8> {
        self.ensure("version", 1)?;
        let version = self.src.get_u8();
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }
        Ok(version)
    }

    pub(crate) fn expect_tag(&mut self, field: &'static str, expected: u8) -> Result<()> {
        self.ensure(field, 1)?;
        let actual = self.src.get_u8();
        if actual != expected {
            return Err(ProtocolError::UnexpectedTag { field, expected, actual });
        }
        Ok(())
    }

    pub(crate) fn read_u32(&mut self, field: &'static str) -> Result<u32> {
        self.ensure(field, 4)?;
        Ok(self.src.get_u32_le())
    }

    pub(crate) fn read_string(&mut self, field: &'static str) -> Result<Vec<u8>> {
        let len = self.read_u32(field)? as usize;
        if len > MAX_FIELD_SIZE {
            return Err(ProtocolError::FieldTooLarge { field, size: len, max: MAX_FIELD_SIZE });
        }
        self.ensure(field, len)?;

        let mut value = vec![0u8; len];
        self.src.copy_to_slice(&mut value);
        Ok(value)
    }

    /// Consume the reader, rejecting leftover bytes.
    pub(crate) fn finish(self) -> Result<()> {
        match self.src.remaining() {
            0 => Ok(()),
            n => Err(ProtocolError::TrailingBytes(n)),
        }
    }
}
