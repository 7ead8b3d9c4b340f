//! Redb-backed durable store.
//!
//! Every write is its own ACID transaction, so a crash leaves each record
//! either fully old or fully new.

use std::{path::Path, sync::Arc};

use omemo_proto::{DeviceId, PeerId};
use redb::{Database, ReadableTable, TableDefinition};

use super::{OmemoStore, StoreError, decode_cbor, encode_cbor};
use crate::{bundle::OmemoBundle, state::RatchetState};

type BytesTable = TableDefinition<'static, &'static [u8], &'static [u8]>;

/// Table: identity
/// Key: `CURRENT_BUNDLE_KEY`
/// Value: CBOR-encoded `OmemoBundle` with private halves
const IDENTITY: BytesTable = TableDefinition::new("identity");

/// Table: devices
/// Key: peer id as UTF-8
/// Value: CBOR-encoded `Vec<DeviceId>`
const DEVICES: BytesTable = TableDefinition::new("devices");

/// Table: bundles
/// Key: device id as big-endian bytes [16 bytes]
/// Value: CBOR-encoded public `OmemoBundle`
const BUNDLES: BytesTable = TableDefinition::new("bundles");

/// Table: sessions
/// Key: device id as big-endian bytes [16 bytes]
/// Value: CBOR-encoded `RatchetState`
const SESSIONS: BytesTable = TableDefinition::new("sessions");

const CURRENT_BUNDLE_KEY: &[u8] = b"current";

/// Durable store backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a Redb database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(|e| StoreError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        for table in [IDENTITY, DEVICES, BUNDLES, SESSIONS] {
            let _ = txn.open_table(table).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn put(&self, table: BytesTable, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(table).map_err(|e| StoreError::Io(e.to_string()))?;
            table.insert(key, value).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))
    }

    fn get(&self, table: BytesTable, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Io(e.to_string()))?;
        let table = txn.open_table(table).map_err(|e| StoreError::Io(e.to_string()))?;

        let value = table
            .get(key)
            .map_err(|e| StoreError::Io(e.to_string()))?
            .map(|guard| guard.value().to_vec());
        Ok(value)
    }
}

impl OmemoStore for RedbStore {
    fn current_device_bundle(&self) -> Result<Option<OmemoBundle>, StoreError> {
        self.get(IDENTITY, CURRENT_BUNDLE_KEY)?.map(|bytes| decode_cbor(&bytes)).transpose()
    }

    fn save_current_device_bundle(&self, bundle: &OmemoBundle) -> Result<(), StoreError> {
        self.put(IDENTITY, CURRENT_BUNDLE_KEY, &encode_cbor(bundle)?)
    }

    fn save_device_id(&self, peer: &PeerId, device: DeviceId) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(DEVICES).map_err(|e| StoreError::Io(e.to_string()))?;
            let key = peer.as_str().as_bytes();

            let existing = table
                .get(key)
                .map_err(|e| StoreError::Io(e.to_string()))?
                .map(|guard| guard.value().to_vec());
            let mut devices: Vec<DeviceId> = match existing {
                Some(bytes) => decode_cbor(&bytes)?,
                None => Vec::new(),
            };

            if devices.contains(&device) {
                return Ok(());
            }
            devices.push(device);

            table
                .insert(key, encode_cbor(&devices)?.as_slice())
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))
    }

    fn device_ids(&self, peer: &PeerId) -> Result<Vec<DeviceId>, StoreError> {
        match self.get(DEVICES, peer.as_str().as_bytes())? {
            Some(bytes) => decode_cbor(&bytes),
            None => Ok(Vec::new()),
        }
    }

    fn save_bundle(&self, device: DeviceId, bundle: &OmemoBundle) -> Result<(), StoreError> {
        self.put(BUNDLES, &device.to_bytes(), &encode_cbor(bundle)?)
    }

    fn bundle(&self, device: DeviceId) -> Result<Option<OmemoBundle>, StoreError> {
        self.get(BUNDLES, &device.to_bytes())?.map(|bytes| decode_cbor(&bytes)).transpose()
    }

    fn save_session(&self, device: DeviceId, state: &RatchetState) -> Result<(), StoreError> {
        self.put(SESSIONS, &device.to_bytes(), &state.to_bytes()?)
    }

    fn session(&self, device: DeviceId) -> Result<Option<RatchetState>, StoreError> {
        self.get(SESSIONS, &device.to_bytes())?
            .map(|bytes| RatchetState::from_bytes(&bytes))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{env::Environment, testing::TestEnv};

    #[test]
    fn records_survive_reopen() {
        let env = TestEnv::new(41);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("omemo.redb");
        let bundle = OmemoBundle::generate(&env, 3);
        let peer = OmemoBundle::generate(&env, 3).public_bundle();
        let bob = PeerId::from("bob");

        {
            let store = RedbStore::open(&path).unwrap();
            store.save_current_device_bundle(&bundle).unwrap();
            store.save_device_id(&bob, peer.device_id()).unwrap();
            store.save_device_id(&bob, peer.device_id()).unwrap();
            store.save_bundle(peer.device_id(), &peer).unwrap();
        }

        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.current_device_bundle().unwrap(), Some(bundle.clone()));
        assert_eq!(store.current_device_id().unwrap(), Some(bundle.device_id()));
        assert_eq!(store.device_ids(&bob).unwrap(), vec![peer.device_id()]);
        assert_eq!(store.bundle(peer.device_id()).unwrap(), Some(peer));
    }

    #[test]
    fn session_roundtrip() {
        let env = TestEnv::new(42);
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("omemo.redb")).unwrap();
        let state = RatchetState::initialize_as_receiver(&[1u8; 96], &[9u8; 32]).unwrap();
        let device = DeviceId(env.random_u128());

        assert!(store.session(device).unwrap().is_none());
        store.save_session(device, &state).unwrap();

        let loaded = store.session(device).unwrap().unwrap();
        assert_eq!(loaded.root_key(), state.root_key());
        assert_eq!(loaded.their_ratchet_key(), state.their_ratchet_key());
    }

    #[test]
    fn empty_database_has_no_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("omemo.redb")).unwrap();

        assert_eq!(store.current_device_id().unwrap(), None);
        assert!(store.device_ids(&PeerId::from("nobody")).unwrap().is_empty());
    }
}
