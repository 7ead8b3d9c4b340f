//! Double ratchet operations over a [`RatchetState`].
//!
//! # Message flow
//!
//! ```text
//! Alice (sender)                              Bob (receiver)
//!   │ initialize_as_sender                      │
//!   │── PreKeyMessage{OlmMessage(R_a, 0)} ────▶│ initialize_as_receiver(R_a)
//!   │── PreKeyMessage{OlmMessage(R_a, 1)} ────▶│ same chain, no DH step
//!   │                                           │ DH(R_b, R_a) → new send chain
//!   │◀──────────────── OlmMessage(R_b, 0) ─────│
//!   │ DH(R_a, R_b) → new recv chain             │
//!   │ ratchet_pending                           │
//!   │ DH(R_a', R_b) → new send chain            │
//!   │── OlmMessage(R_a', 0) ──────────────────▶│ DH(R_b, R_a') → new recv chain
//! ```
//!
//! # Atomicity
//!
//! Every operation runs against a clone of the state and writes it back only
//! on success. A rejected message (bad MAC, replay, malformed bytes) leaves
//! the caller's state exactly as it was.

use omemo_crypto::{
    ChainKeys, KEY_SIZE, MessageKeys,
    kdf::{message_key, next_chain_key},
};
use omemo_proto::{OlmMessage, PreKeyMessage, split_mac};
use zeroize::Zeroize;

use crate::{
    config::OmemoConfig,
    env::Environment,
    error::SessionError,
    handshake::generate_key_pair,
    state::{RatchetState, SkippedMessageKey},
};

/// A ratchet session borrowing one device pair's state
///
/// Holding `&mut RatchetState` serializes all operations on that state.
pub struct RatchetSession<'a, E: Environment> {
    state: &'a mut RatchetState,
    env: &'a E,
    config: &'a OmemoConfig,
}

impl<'a, E: Environment> RatchetSession<'a, E> {
    /// Session over `state`.
    pub fn new(state: &'a mut RatchetState, env: &'a E, config: &'a OmemoConfig) -> Self {
        Self { state, env, config }
    }

    /// State as it stands after the last successful operation.
    pub fn state(&self) -> &RatchetState {
        self.state
    }

    /// Encrypt `plaintext` into an encoded [`PreKeyMessage`].
    ///
    /// # Errors
    ///
    /// - `NotSender` if the state did not initiate the handshake
    /// - anything [`Self::create_message`] returns
    pub fn create_pre_key_message(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, SessionError> {
        let (Some(identity), Some(ephemeral), Some(one_time_key)) = (
            self.state.my_identity_key.as_ref(),
            self.state.my_ephemeral_key.as_ref(),
            self.state.their_one_time_key,
        ) else {
            return Err(SessionError::NotSender);
        };
        let identity_key = *identity.public_key();
        let base_key = *ephemeral.public_key();

        let mut working = self.state.clone();
        let message = seal(&mut working, self.env, plaintext)?;
        let bytes = PreKeyMessage::new(one_time_key, base_key, identity_key, message).to_bytes()?;

        *self.state = working;
        Ok(bytes)
    }

    /// Encrypt `plaintext` into `OlmMessage ‖ mac`.
    ///
    /// Performs a DH ratchet step first when the peer's ratchet key is known
    /// and either no sending chain exists or a step is pending.
    ///
    /// # Errors
    ///
    /// - `NoSendChain` if there is no sending chain and the peer's ratchet
    ///   key is still unknown
    /// - `ChainIndexOverflow` after `u32::MAX` messages in one chain
    pub fn create_message(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, SessionError> {
        let mut working = self.state.clone();
        let bytes = seal(&mut working, self.env, plaintext)?;

        *self.state = working;
        Ok(bytes)
    }

    /// Authenticate and decrypt `OlmMessage ‖ mac`.
    ///
    /// `is_pre_key` marks a payload that arrived inside a [`PreKeyMessage`];
    /// such messages continue the handshake chain and never trigger a DH
    /// step.
    ///
    /// # Errors
    ///
    /// - `Protocol` if the bytes are malformed
    /// - `Decryption` on MAC mismatch, bad padding, or an already consumed
    ///   chain index
    /// - `TooManySkipped` if the message is more than `max_skip` ahead
    pub fn read_message(&mut self, bytes: &[u8], is_pre_key: bool) -> Result<Vec<u8>, SessionError> {
        let mut working = self.state.clone();
        let plaintext = open(&mut working, self.env, self.config, bytes, is_pre_key)?;

        *self.state = working;
        Ok(plaintext)
    }
}

fn seal<E: Environment>(
    state: &mut RatchetState,
    env: &E,
    plaintext: &[u8],
) -> Result<Vec<u8>, SessionError> {
    let needs_step = state.ratchet_pending || state.send_chain_key.is_none();
    if let (Some(their_ratchet_key), true) = (state.their_ratchet_key, needs_step) {
        let ratchet_key = generate_key_pair(env);
        let mut dh = ratchet_key.agree(&their_ratchet_key)?;
        let keys = ChainKeys::ratchet(&state.root_key, &dh);
        dh.zeroize();

        state.root_key = keys.root_key;
        state.send_chain_key = Some(keys.chain_key);
        state.send_chain_index = 0;
        state.my_ratchet_key = Some(ratchet_key);
        state.ratchet_pending = false;

        tracing::debug!("send ratchet advanced");
    }

    let Some(mut chain_key) = state.send_chain_key else {
        return Err(SessionError::NoSendChain);
    };
    let ratchet_public = state.my_ratchet_public_key().ok_or(SessionError::NoSendChain)?;
    let index = state.send_chain_index;
    let next_index = index.checked_add(1).ok_or(SessionError::ChainIndexOverflow)?;

    let mut mk = message_key(&chain_key);
    let keys = MessageKeys::derive(&mk);
    mk.zeroize();

    let message = OlmMessage::new(ratchet_public.to_vec(), index, keys.encrypt(plaintext));
    let mut bytes = message.to_bytes()?;
    let mac = keys.mac(&bytes);
    bytes.extend_from_slice(&mac);

    state.send_chain_key = Some(next_chain_key(&chain_key));
    state.send_chain_index = next_index;
    chain_key.zeroize();

    tracing::trace!(index, len = bytes.len(), "message sealed");
    Ok(bytes)
}

fn open<E: Environment>(
    state: &mut RatchetState,
    env: &E,
    config: &OmemoConfig,
    bytes: &[u8],
    is_pre_key: bool,
) -> Result<Vec<u8>, SessionError> {
    let (body, mac) = split_mac(bytes)?;
    let message = OlmMessage::decode(body)?;

    // Expired keys must never be trialled
    let now = env.wall_clock_secs();
    state.prune_skipped_keys(now, config.skipped_key_max_age.as_secs(), config.max_skipped_keys);

    if let Some(plaintext) = open_with_skipped_key(state, body, &mac, &message.ciphertext)? {
        return Ok(plaintext);
    }

    if !is_pre_key && state.their_ratchet_key.as_ref().map(<[u8; KEY_SIZE]>::as_slice)
        != Some(message.ratchet_key.as_slice())
    {
        ratchet_receive_chain(state, &message.ratchet_key)?;
    }

    let Some(mut chain_key) = state.recv_chain_key else {
        return Err(SessionError::NoReceiveChain);
    };
    let target = message.chain_index;
    let current = state.recv_chain_index;

    if target < current {
        return Err(SessionError::decryption(format!(
            "chain index {target} already consumed (next is {current})"
        )));
    }
    if target - current > config.max_skip {
        return Err(SessionError::TooManySkipped {
            current,
            requested: target,
            max: config.max_skip,
        });
    }

    for _ in current..target {
        state.skipped_message_keys.push_back(SkippedMessageKey {
            timestamp: now,
            key: message_key(&chain_key),
        });
        chain_key = next_chain_key(&chain_key);
    }
    if target > current {
        tracing::debug!(from = current, to = target, "cached skipped message keys");
    }

    let mut mk = message_key(&chain_key);
    let keys = MessageKeys::derive(&mk);
    mk.zeroize();

    if !keys.verify_mac(body, &mac) {
        chain_key.zeroize();
        return Err(SessionError::decryption("MAC mismatch"));
    }
    let plaintext = keys
        .decrypt(&message.ciphertext)
        .map_err(|err| SessionError::decryption(err.to_string()))?;

    state.recv_chain_key = Some(next_chain_key(&chain_key));
    state.recv_chain_index = target.checked_add(1).ok_or(SessionError::ChainIndexOverflow)?;
    chain_key.zeroize();

    state.prune_skipped_keys(
        now,
        config.skipped_key_max_age.as_secs(),
        config.max_skipped_keys,
    );

    tracing::trace!(index = target, "message opened");
    Ok(plaintext)
}

/// Trial-decrypt with every cached skipped key. A hit consumes the key.
fn open_with_skipped_key(
    state: &mut RatchetState,
    body: &[u8],
    mac: &[u8],
    ciphertext: &[u8],
) -> Result<Option<Vec<u8>>, SessionError> {
    let hit = state.skipped_message_keys.iter().position(|skipped| {
        MessageKeys::derive(&skipped.key).verify_mac(body, mac)
    });

    let Some(position) = hit else {
        if !state.skipped_message_keys.is_empty() {
            tracing::trace!(
                cached = state.skipped_message_keys.len(),
                "no cached skipped key matched"
            );
        }
        return Ok(None);
    };

    let Some(skipped) = state.skipped_message_keys.remove(position) else {
        return Ok(None);
    };
    let plaintext = MessageKeys::derive(&skipped.key)
        .decrypt(ciphertext)
        .map_err(|err| SessionError::decryption(err.to_string()))?;

    tracing::debug!(remaining = state.skipped_message_keys.len(), "opened with skipped key");
    Ok(Some(plaintext))
}

/// DH ratchet step for a new peer ratchet key.
fn ratchet_receive_chain(state: &mut RatchetState, their_ratchet_key: &[u8]) -> Result<(), SessionError> {
    let Some(my_ratchet_key) = state.my_ratchet_key.as_ref() else {
        return Err(SessionError::decryption("new ratchet key before our first message"));
    };

    let mut dh = my_ratchet_key.agree(their_ratchet_key)?;
    let keys = ChainKeys::ratchet(&state.root_key, &dh);
    dh.zeroize();

    let mut their_key = [0u8; KEY_SIZE];
    their_key.copy_from_slice(their_ratchet_key);

    state.root_key = keys.root_key;
    state.recv_chain_key = Some(keys.chain_key);
    state.recv_chain_index = 0;
    state.their_ratchet_key = Some(their_key);
    state.ratchet_pending = true;

    tracing::debug!("receive ratchet advanced");
    Ok(())
}
