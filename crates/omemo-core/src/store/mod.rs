//! Persistence for identities, peer bundles and ratchet sessions
//!
//! The trait is synchronous. Implementations share their state through `Arc`
//! so clones see the same records.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticStore;
pub use error::StoreError;
pub use memory::MemoryStore;
use omemo_proto::{DeviceId, PeerId};
use serde::{Serialize, de::DeserializeOwned};

pub use self::redb::RedbStore;
use crate::{bundle::OmemoBundle, state::RatchetState};

/// Storage contract for one local device
///
/// Absent records are not errors: lookups return `None` or an empty list.
///
/// # Panics
///
/// In-memory implementations may panic if an internal mutex is poisoned.
pub trait OmemoStore: Clone + Send + Sync + 'static {
    /// Id of our own device. `None` before the first bundle is saved.
    fn current_device_id(&self) -> Result<Option<DeviceId>, StoreError> {
        Ok(self.current_device_bundle()?.map(|bundle| bundle.device_id()))
    }

    /// Our own bundle, private halves included.
    fn current_device_bundle(&self) -> Result<Option<OmemoBundle>, StoreError>;

    /// Replace our own bundle.
    ///
    /// Called when a one-time pre-key is consumed and replaced.
    fn save_current_device_bundle(&self, bundle: &OmemoBundle) -> Result<(), StoreError>;

    /// Record that `device` belongs to `peer`. Idempotent.
    fn save_device_id(&self, peer: &PeerId, device: DeviceId) -> Result<(), StoreError>;

    /// Known devices of `peer`, in the order they were first recorded.
    fn device_ids(&self, peer: &PeerId) -> Result<Vec<DeviceId>, StoreError>;

    /// Store the published bundle of a peer device. Overwrites.
    fn save_bundle(&self, device: DeviceId, bundle: &OmemoBundle) -> Result<(), StoreError>;

    /// Published bundle of a peer device.
    fn bundle(&self, device: DeviceId) -> Result<Option<OmemoBundle>, StoreError>;

    /// Store the session with a peer device. Overwrites.
    fn save_session(&self, device: DeviceId, state: &RatchetState) -> Result<(), StoreError>;

    /// Session with a peer device.
    fn session(&self, device: DeviceId) -> Result<Option<RatchetState>, StoreError>;
}

pub(crate) fn encode_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(bytes)
}

pub(crate) fn decode_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    ciborium::de::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}
