//! Device key bundles
//!
//! Our own bundle holds private halves and never leaves the store. Peer
//! bundles are built from a published [`BundleDocument`] and hold public
//! halves only.

use omemo_crypto::{CryptoError, KeyPair};
use omemo_proto::{BundleDocument, DeviceId, PreKeyPublic};
use serde::{Deserialize, Serialize};

use crate::{env::Environment, handshake::generate_key_pair, store};

/// A one-time pre-key and its published identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreKey {
    /// Identifier published alongside the key
    pub id: u32,
    /// Key pair (public-only for peer bundles)
    pub key: KeyPair,
}

/// Identity key and one-time pre-keys of one device
///
/// # Invariants
///
/// - Pre-key ids are unique within a bundle and never reused after removal.
/// - Once a one-time pre-key has been used for a handshake it is removed, so
///   a later compromise of this bundle cannot recover that session's secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OmemoBundle {
    device_id: DeviceId,
    identity_key: KeyPair,
    pre_keys: Vec<PreKey>,
    next_pre_key_id: u32,
}

impl OmemoBundle {
    /// Fresh bundle with a random device id, identity key and `pre_key_count`
    /// one-time pre-keys.
    pub fn generate<E: Environment>(env: &E, pre_key_count: usize) -> Self {
        let mut bundle = Self {
            device_id: DeviceId(env.random_u128()),
            identity_key: generate_key_pair(env),
            pre_keys: Vec::with_capacity(pre_key_count),
            next_pre_key_id: 0,
        };
        bundle.replenish(env, pre_key_count);
        bundle
    }

    /// Peer bundle from a published document.
    ///
    /// # Errors
    ///
    /// - `InvalidKey` if the identity key or any pre-key is not 32 bytes
    pub fn from_document(document: &BundleDocument) -> Result<Self, CryptoError> {
        let identity_key = KeyPair::from_public_slice(&document.identity_key)?;
        let pre_keys = document
            .pre_keys
            .iter()
            .map(|pre_key| {
                Ok(PreKey { id: pre_key.id, key: KeyPair::from_public_slice(&pre_key.key)? })
            })
            .collect::<Result<Vec<_>, CryptoError>>()?;
        let next_pre_key_id =
            pre_keys.iter().map(|pre_key| pre_key.id.saturating_add(1)).max().unwrap_or(0);

        Ok(Self { device_id: document.device_id, identity_key, pre_keys, next_pre_key_id })
    }

    /// Publishable document (public halves only).
    pub fn to_document(&self) -> BundleDocument {
        BundleDocument {
            device_id: self.device_id,
            identity_key: self.identity_key.public_key().to_vec(),
            pre_keys: self
                .pre_keys
                .iter()
                .map(|pre_key| PreKeyPublic {
                    id: pre_key.id,
                    key: pre_key.key.public_key().to_vec(),
                })
                .collect(),
        }
    }

    /// Copy with every private half stripped.
    pub fn public_bundle(&self) -> Self {
        Self {
            device_id: self.device_id,
            identity_key: self.identity_key.to_public(),
            pre_keys: self
                .pre_keys
                .iter()
                .map(|pre_key| PreKey { id: pre_key.id, key: pre_key.key.to_public() })
                .collect(),
            next_pre_key_id: self.next_pre_key_id,
        }
    }

    /// Owning device.
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Long-term identity key.
    pub fn identity_key(&self) -> &KeyPair {
        &self.identity_key
    }

    /// Current one-time pre-keys.
    pub fn pre_keys(&self) -> &[PreKey] {
        &self.pre_keys
    }

    /// Pre-key with the given public half.
    pub fn find_pre_key(&self, public_key: &[u8]) -> Option<&KeyPair> {
        self.pre_keys
            .iter()
            .find(|pre_key| pre_key.key.public_key().as_slice() == public_key)
            .map(|pre_key| &pre_key.key)
    }

    /// Remove a consumed pre-key. Returns it if it was present.
    pub fn remove_pre_key(&mut self, public_key: &[u8]) -> Option<KeyPair> {
        let position = self
            .pre_keys
            .iter()
            .position(|pre_key| pre_key.key.public_key().as_slice() == public_key)?;
        Some(self.pre_keys.remove(position).key)
    }

    /// Uniformly chosen pre-key, `None` if the bundle has none left.
    pub fn random_pre_key<E: Environment>(&self, env: &E) -> Option<&KeyPair> {
        if self.pre_keys.is_empty() {
            return None;
        }
        self.pre_keys.get(env.random_index(self.pre_keys.len())).map(|pre_key| &pre_key.key)
    }

    /// Generate fresh pre-keys until `target` are present. Returns how many
    /// were added.
    pub fn replenish<E: Environment>(&mut self, env: &E, target: usize) -> usize {
        let missing = target.saturating_sub(self.pre_keys.len());
        for _ in 0..missing {
            let id = self.next_pre_key_id;
            self.next_pre_key_id = self.next_pre_key_id.wrapping_add(1);
            self.pre_keys.push(PreKey { id, key: generate_key_pair(env) });
        }
        missing
    }

    /// Encode as CBOR for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>, store::StoreError> {
        store::encode_cbor(self)
    }

    /// Decode from CBOR storage.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, store::StoreError> {
        store::decode_cbor(bytes)
    }
}
