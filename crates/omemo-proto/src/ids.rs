//! Device and peer identifiers

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Random 128-bit identifier of one device
///
/// Rendered as 32 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub u128);

impl DeviceId {
    /// Raw value.
    pub fn as_u128(self) -> u128 {
        self.0
    }

    /// Big-endian bytes, used as a storage key.
    pub fn to_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for DeviceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u128::from_str_radix(s, 16).map(Self)
    }
}

impl From<u128> for DeviceId {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

/// Bare address of a peer (for example `alice@example.org`)
///
/// A peer owns one or more devices.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap a bare address.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_display_parse_roundtrip() {
        let id = DeviceId(0x0123_4567_89ab_cdef_0011_2233_4455_6677);
        let rendered = id.to_string();

        assert_eq!(rendered, "0123456789abcdef0011223344556677");
        assert_eq!(rendered.parse::<DeviceId>().unwrap(), id);
    }

    #[test]
    fn device_id_display_is_zero_padded() {
        assert_eq!(DeviceId(1).to_string().len(), 32);
    }
}
