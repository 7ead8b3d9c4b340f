use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use omemo_proto::{DeviceId, PeerId};

use super::{OmemoStore, StoreError};
use crate::{bundle::OmemoBundle, state::RatchetState};

/// In-memory store for tests and simulation
///
/// All state sits behind one `Arc<Mutex<..>>`, so clones share records.
/// Uses `lock().expect()`, which panics if the mutex is poisoned.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    current: Option<OmemoBundle>,
    devices: HashMap<PeerId, Vec<DeviceId>>,
    bundles: HashMap<DeviceId, OmemoBundle>,
    sessions: HashMap<DeviceId, RatchetState>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn session_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").sessions.len()
    }
}

impl OmemoStore for MemoryStore {
    #[allow(clippy::expect_used)]
    fn current_device_bundle(&self) -> Result<Option<OmemoBundle>, StoreError> {
        Ok(self.inner.lock().expect("Mutex poisoned").current.clone())
    }

    #[allow(clippy::expect_used)]
    fn save_current_device_bundle(&self, bundle: &OmemoBundle) -> Result<(), StoreError> {
        self.inner.lock().expect("Mutex poisoned").current = Some(bundle.clone());
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn save_device_id(&self, peer: &PeerId, device: DeviceId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        let devices = inner.devices.entry(peer.clone()).or_default();
        if !devices.contains(&device) {
            devices.push(device);
        }
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn device_ids(&self, peer: &PeerId) -> Result<Vec<DeviceId>, StoreError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.devices.get(peer).cloned().unwrap_or_default())
    }

    #[allow(clippy::expect_used)]
    fn save_bundle(&self, device: DeviceId, bundle: &OmemoBundle) -> Result<(), StoreError> {
        self.inner.lock().expect("Mutex poisoned").bundles.insert(device, bundle.clone());
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn bundle(&self, device: DeviceId) -> Result<Option<OmemoBundle>, StoreError> {
        Ok(self.inner.lock().expect("Mutex poisoned").bundles.get(&device).cloned())
    }

    #[allow(clippy::expect_used)]
    fn save_session(&self, device: DeviceId, state: &RatchetState) -> Result<(), StoreError> {
        self.inner.lock().expect("Mutex poisoned").sessions.insert(device, state.clone());
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn session(&self, device: DeviceId) -> Result<Option<RatchetState>, StoreError> {
        Ok(self.inner.lock().expect("Mutex poisoned").sessions.get(&device).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestEnv;

    #[test]
    fn device_ids_are_deduplicated_in_insertion_order() {
        let store = MemoryStore::new();
        let bob = PeerId::from("bob");

        store.save_device_id(&bob, DeviceId(2)).unwrap();
        store.save_device_id(&bob, DeviceId(1)).unwrap();
        store.save_device_id(&bob, DeviceId(2)).unwrap();

        assert_eq!(store.device_ids(&bob).unwrap(), vec![DeviceId(2), DeviceId(1)]);
        assert!(store.device_ids(&PeerId::from("carol")).unwrap().is_empty());
    }

    #[test]
    fn clones_share_records() {
        let env = TestEnv::new(31);
        let store = MemoryStore::new();
        let clone = store.clone();
        let bundle = OmemoBundle::generate(&env, 2);

        assert_eq!(store.current_device_id().unwrap(), None);
        clone.save_current_device_bundle(&bundle).unwrap();

        assert_eq!(store.current_device_id().unwrap(), Some(bundle.device_id()));
        assert_eq!(store.current_device_bundle().unwrap(), Some(bundle));
    }

    #[test]
    fn missing_records_are_none() {
        let store = MemoryStore::new();

        assert!(store.bundle(DeviceId(9)).unwrap().is_none());
        assert!(store.session(DeviceId(9)).unwrap().is_none());
        assert_eq!(store.session_count(), 0);
    }
}
