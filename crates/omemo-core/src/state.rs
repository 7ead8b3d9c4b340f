//! Persistent double ratchet state for one ordered device pair.
//!
//! A [`RatchetState`] is plain data. All transitions happen in
//! [`crate::session::RatchetSession`], which mutates a working copy and only
//! writes it back once an operation has fully succeeded.

use std::{collections::VecDeque, fmt};

use omemo_crypto::{ChainKeys, CryptoError, KEY_SIZE, KeyPair};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{env::Environment, handshake::generate_key_pair, store};

/// A message key cached for a message that has not arrived yet
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedMessageKey {
    /// Unix seconds when the key was derived
    pub timestamp: u64,
    /// Message key (expanded into cipher/MAC/IV keys on use)
    pub key: [u8; KEY_SIZE],
}

impl fmt::Debug for SkippedMessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkippedMessageKey")
            .field("timestamp", &self.timestamp)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl Drop for SkippedMessageKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Double ratchet state between our device and one peer device
///
/// # Invariants
///
/// - `root_key` is only ever produced by the root KDF (`OLM_ROOT` at
///   initialization, `OLM_RATCHET` at each DH step).
/// - A chain index resets to 0 exactly when its chain key is replaced by a
///   root KDF step, and otherwise only increases.
/// - `recv_chain_index` is the index of the next unconsumed key in the
///   receiving chain; everything below it was consumed or cached.
/// - The session is established iff `their_ratchet_key` is set.
///
/// # Security
///
/// Root, chain and cached message keys are zeroized on drop. The `Debug`
/// output never contains key material.
#[derive(Clone, Serialize, Deserialize)]
pub struct RatchetState {
    pub(crate) my_identity_key: Option<KeyPair>,
    pub(crate) my_ephemeral_key: Option<KeyPair>,
    pub(crate) their_one_time_key: Option<[u8; KEY_SIZE]>,
    pub(crate) my_ratchet_key: Option<KeyPair>,
    pub(crate) their_ratchet_key: Option<[u8; KEY_SIZE]>,
    pub(crate) root_key: [u8; KEY_SIZE],
    pub(crate) send_chain_key: Option<[u8; KEY_SIZE]>,
    pub(crate) send_chain_index: u32,
    pub(crate) recv_chain_key: Option<[u8; KEY_SIZE]>,
    pub(crate) recv_chain_index: u32,
    pub(crate) ratchet_pending: bool,
    pub(crate) skipped_message_keys: VecDeque<SkippedMessageKey>,
}

impl RatchetState {
    /// State for the device that initiated the handshake.
    ///
    /// The initial chain becomes the sending chain, paired with a fresh
    /// ratchet key. Messages go out as pre-key messages until the peer's
    /// first reply establishes the session.
    pub fn initialize_as_sender<E: Environment>(
        secret: &[u8],
        my_identity_key: KeyPair,
        my_ephemeral_key: KeyPair,
        their_one_time_key: [u8; KEY_SIZE],
        env: &E,
    ) -> Self {
        let keys = ChainKeys::from_shared_secret(secret);

        Self {
            my_identity_key: Some(my_identity_key),
            my_ephemeral_key: Some(my_ephemeral_key),
            their_one_time_key: Some(their_one_time_key),
            my_ratchet_key: Some(generate_key_pair(env)),
            their_ratchet_key: None,
            root_key: keys.root_key,
            send_chain_key: Some(keys.chain_key),
            send_chain_index: 0,
            recv_chain_key: None,
            recv_chain_index: 0,
            ratchet_pending: false,
            skipped_message_keys: VecDeque::new(),
        }
    }

    /// State for the device that received the handshake.
    ///
    /// The initial chain becomes the receiving chain and the sender's ratchet
    /// key is recorded, so the session is established immediately.
    ///
    /// # Errors
    ///
    /// - `InvalidKey` if `their_ratchet_key` is not 32 bytes
    pub fn initialize_as_receiver(
        secret: &[u8],
        their_ratchet_key: &[u8],
    ) -> Result<Self, CryptoError> {
        let their_ratchet_key = *KeyPair::from_public_slice(their_ratchet_key)?.public_key();
        let keys = ChainKeys::from_shared_secret(secret);

        Ok(Self {
            my_identity_key: None,
            my_ephemeral_key: None,
            their_one_time_key: None,
            my_ratchet_key: None,
            their_ratchet_key: Some(their_ratchet_key),
            root_key: keys.root_key,
            send_chain_key: None,
            send_chain_index: 0,
            recv_chain_key: Some(keys.chain_key),
            recv_chain_index: 0,
            ratchet_pending: false,
            skipped_message_keys: VecDeque::new(),
        })
    }

    /// Whether the peer has answered (or we answered the peer's handshake).
    pub fn is_established(&self) -> bool {
        self.their_ratchet_key.is_some()
    }

    /// Whether this state was created by [`Self::initialize_as_sender`].
    pub fn is_sender(&self) -> bool {
        self.my_ephemeral_key.is_some()
    }

    /// Current root key.
    pub fn root_key(&self) -> &[u8; KEY_SIZE] {
        &self.root_key
    }

    /// Index of the next message to send in the current sending chain.
    pub fn send_chain_index(&self) -> u32 {
        self.send_chain_index
    }

    /// Index of the next expected message in the current receiving chain.
    pub fn recv_chain_index(&self) -> u32 {
        self.recv_chain_index
    }

    /// Whether the next send performs a DH ratchet step.
    pub fn ratchet_pending(&self) -> bool {
        self.ratchet_pending
    }

    /// Our current ratchet public key.
    pub fn my_ratchet_public_key(&self) -> Option<&[u8; KEY_SIZE]> {
        self.my_ratchet_key.as_ref().map(KeyPair::public_key)
    }

    /// Peer's most recent ratchet public key.
    pub fn their_ratchet_key(&self) -> Option<&[u8; KEY_SIZE]> {
        self.their_ratchet_key.as_ref()
    }

    /// Number of cached skipped message keys.
    pub fn skipped_key_count(&self) -> usize {
        self.skipped_message_keys.len()
    }

    /// Cached skipped message keys, oldest first.
    pub fn skipped_message_keys(&self) -> impl Iterator<Item = &SkippedMessageKey> {
        self.skipped_message_keys.iter()
    }

    /// Drop cached keys older than `max_age_secs`, then the oldest keys
    /// beyond `max_keys`.
    pub(crate) fn prune_skipped_keys(&mut self, now: u64, max_age_secs: u64, max_keys: usize) {
        self.skipped_message_keys
            .retain(|skipped| now.saturating_sub(skipped.timestamp) <= max_age_secs);

        while self.skipped_message_keys.len() > max_keys {
            self.skipped_message_keys.pop_front();
        }
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

impl fmt::Debug for RatchetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RatchetState")
            .field("sender", &self.is_sender())
            .field("established", &self.is_established())
            .field("my_ratchet_key", &self.my_ratchet_public_key())
            .field("their_ratchet_key", &self.their_ratchet_key)
            .field("send_chain_index", &self.send_chain_index)
            .field("recv_chain_index", &self.recv_chain_index)
            .field("ratchet_pending", &self.ratchet_pending)
            .field("skipped_keys", &self.skipped_message_keys.len())
            .finish_non_exhaustive()
    }
}

impl Drop for RatchetState {
    fn drop(&mut self) {
        self.root_key.zeroize();
        self.send_chain_key.zeroize();
        self.recv_chain_key.zeroize();
    }
}
