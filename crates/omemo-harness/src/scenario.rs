//! Two-device conversation driver
//!
//! Wraps the handshake and both ratchet states so tests can talk in terms of
//! "Alice sends, Bob receives" and choose the delivery order themselves.

use omemo_core::{
    OmemoConfig, RatchetSession, RatchetState, SessionError,
    handshake::{generate_key_pair, sender_triple_dh},
};
use omemo_proto::{PreKeyMessage, ProtocolError};

use crate::sim_env::SimEnv;

/// One end of the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Initiator of the handshake
    Alice,
    /// Owner of the one-time pre-key
    Bob,
}

impl Side {
    /// The other end.
    pub fn peer(self) -> Self {
        match self {
            Self::Alice => Self::Bob,
            Self::Bob => Self::Alice,
        }
    }
}

/// Message in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wire {
    /// Sender
    pub from: Side,
    /// `bytes` is an encoded `PreKeyMessage`
    pub pre_key: bool,
    /// Encoded message
    pub bytes: Vec<u8>,
}

/// Alice and Bob sharing one simulated environment
///
/// Bob's receiver state is built from Alice's first ratchet key as soon as
/// the conversation starts, the way a device would on reading Alice's first
/// pre-key message.
pub struct Conversation {
    env: SimEnv,
    config: OmemoConfig,
    alice: RatchetState,
    bob: RatchetState,
}

impl Conversation {
    /// Run the triple-DH handshake with default configuration.
    ///
    /// # Errors
    ///
    /// - `Crypto` if the handshake produces a non-contributory secret
    pub fn new(seed: u64) -> Result<Self, SessionError> {
        Self::with_config(seed, OmemoConfig::default())
    }

    /// Run the triple-DH handshake with `config` applied to both sides.
    ///
    /// # Errors
    ///
    /// - `Crypto` if the handshake produces a non-contributory secret
    pub fn with_config(seed: u64, config: OmemoConfig) -> Result<Self, SessionError> {
        let env = SimEnv::with_seed(seed);
        let alice_identity = generate_key_pair(&env);
        let alice_ephemeral = generate_key_pair(&env);
        let bob_identity = generate_key_pair(&env);
        let bob_one_time = generate_key_pair(&env);

        let secret = sender_triple_dh(
            &alice_identity,
            &alice_ephemeral,
            bob_identity.public_key(),
            bob_one_time.public_key(),
        )?;
        let alice = RatchetState::initialize_as_sender(
            &secret,
            alice_identity,
            alice_ephemeral,
            *bob_one_time.public_key(),
            &env,
        );
        let alice_ratchet = alice.my_ratchet_public_key().ok_or(SessionError::NoSendChain)?;
        let bob = RatchetState::initialize_as_receiver(&secret, alice_ratchet)?;

        tracing::debug!(seed, "conversation started");
        Ok(Self { env, config, alice, bob })
    }

    /// Shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// State of one side.
    pub fn state(&self, side: Side) -> &RatchetState {
        match side {
            Side::Alice => &self.alice,
            Side::Bob => &self.bob,
        }
    }

    /// Encrypt `plaintext` from `from`. Alice sends pre-key messages until
    /// she has heard from Bob.
    ///
    /// # Errors
    ///
    /// Any error from the ratchet session.
    pub fn send(&mut self, from: Side, plaintext: &[u8]) -> Result<Wire, SessionError> {
        let (env, config) = (&self.env, &self.config);
        let state = match from {
            Side::Alice => &mut self.alice,
            Side::Bob => &mut self.bob,
        };

        let pre_key = !state.is_established();
        let mut session = RatchetSession::new(state, env, config);
        let bytes = if pre_key {
            session.create_pre_key_message(plaintext)?
        } else {
            session.create_message(plaintext)?
        };

        Ok(Wire { from, pre_key, bytes })
    }

    /// Deliver `wire` to the other side.
    ///
    /// # Errors
    ///
    /// Any error from the ratchet session, or `Protocol` if a pre-key
    /// envelope is malformed.
    pub fn receive(&mut self, wire: &Wire) -> Result<Vec<u8>, SessionError> {
        let (env, config) = (&self.env, &self.config);
        let state = match wire.from.peer() {
            Side::Alice => &mut self.alice,
            Side::Bob => &mut self.bob,
        };

        let inner;
        let message = if wire.pre_key {
            inner = PreKeyMessage::decode(&wire.bytes).map_err(SessionError::from)?;
            &inner.message
        } else {
            &wire.bytes
        };

        RatchetSession::new(state, env, config).read_message(message, wire.pre_key)
    }

    /// Send and deliver immediately.
    ///
    /// # Errors
    ///
    /// Any error from [`Self::send`] or [`Self::receive`].
    pub fn exchange(&mut self, from: Side, plaintext: &[u8]) -> Result<Vec<u8>, SessionError> {
        let wire = self.send(from, plaintext)?;
        self.receive(&wire)
    }
}

/// Encoded `PreKeyMessage` unwrapped to its inner `OlmMessage ‖ mac`.
///
/// # Errors
///
/// - any decode error
pub fn inner_message(wire: &Wire) -> Result<Vec<u8>, ProtocolError> {
    if wire.pre_key {
        Ok(PreKeyMessage::decode(&wire.bytes)?.message)
    } else {
        Ok(wire.bytes.clone())
    }
}
