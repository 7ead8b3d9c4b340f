//! Published key material
//!
//! A device publishes its identity key and a batch of one-time pre-keys so
//! peers can open a session while it is offline. Only public halves ever
//! appear in these documents.

use serde::{Deserialize, Serialize};

use crate::{DeviceId, PeerId, cbor, errors::Result};

/// Public bundle of one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleDocument {
    /// Owning device
    pub device_id: DeviceId,
    /// Long-term identity public key
    pub identity_key: Vec<u8>,
    /// One-time pre-keys, each addressable by `id`
    pub pre_keys: Vec<PreKeyPublic>,
}

/// One published one-time pre-key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreKeyPublic {
    /// Position-independent identifier
    pub id: u32,
    /// X25519 public key
    pub key: Vec<u8>,
}

impl BundleDocument {
    /// Encode as CBOR.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        cbor::encode(self)
    }

    /// Decode from CBOR.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        cbor::decode("bundle", bytes)
    }
}

/// Devices a peer currently advertises
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceListDocument {
    /// Peer owning the devices
    pub peer: PeerId,
    /// Advertised devices
    pub devices: Vec<DeviceId>,
}

impl DeviceListDocument {
    /// Encode as CBOR.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        cbor::encode(self)
    }

    /// Decode from CBOR.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        cbor::decode("device list", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_cbor_roundtrip() {
        let bundle = BundleDocument {
            device_id: DeviceId(42),
            identity_key: vec![1u8; 32],
            pre_keys: (0..3).map(|id| PreKeyPublic { id, key: vec![id as u8; 32] }).collect(),
        };

        assert_eq!(BundleDocument::from_bytes(&bundle.to_bytes().unwrap()).unwrap(), bundle);
    }

    #[test]
    fn device_list_cbor_roundtrip() {
        let list = DeviceListDocument {
            peer: PeerId::new("bob@example.org"),
            devices: vec![DeviceId(1), DeviceId(2)],
        };

        assert_eq!(DeviceListDocument::from_bytes(&list.to_bytes().unwrap()).unwrap(), list);
    }

    #[test]
    fn envelope_bytes_are_not_a_bundle() {
        assert!(BundleDocument::from_bytes(b"not cbor at all").is_err());
    }
}
