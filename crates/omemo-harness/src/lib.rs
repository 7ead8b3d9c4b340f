//! Deterministic simulation harness for OMEMO sessions.
//!
//! [`SimEnv`] replaces the system clock and RNG with a seeded ChaCha20 stream
//! and a virtual clock, so a failing property test replays exactly from its
//! seed. [`Conversation`] drives two ratchet states through the handshake and
//! lets tests decide when, and in what order, messages are delivered.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod scenario;
pub mod sim_env;

pub use scenario::{Conversation, Side, Wire, inner_message};
pub use sim_env::{SIM_EPOCH_SECS, SimEnv};
