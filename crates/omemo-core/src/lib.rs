//! OMEMO Session Engine
//!
//! Olm double ratchet sessions between devices, and the device manager that
//! fans one message out to every device of every recipient.
//!
//! # Architecture
//!
//! ```text
//!             ┌────────────────────────────────────────┐
//!  plaintext ─▶ Omemo (device manager)                 ─▶ EncryptedEnvelope
//!             │  ├─ OmemoBundle      our keys          │
//!             │  ├─ RatchetSession   per peer device   │
//!             │  └─ OmemoStore       sessions, bundles │
//!             └────────────────────────────────────────┘
//! ```
//!
//! [`RatchetSession`] is pure: given a [`RatchetState`], an [`Environment`]
//! and bytes, it produces bytes and a new state. [`Omemo`] adds lookup,
//! handshake and persistence around it.
//!
//! # Invariants
//!
//! - A failed ratchet operation never changes the stored state.
//! - Message keys are used once: a replayed message fails to decrypt.
//! - A consumed one-time pre-key is removed from our bundle.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bundle;
pub mod config;
pub mod env;
pub mod error;
pub mod filter;
pub mod handshake;
pub mod omemo;
pub mod session;
pub mod state;
pub mod store;
pub mod system_env;

#[cfg(test)]
mod testing;

pub use bundle::{OmemoBundle, PreKey};
pub use config::OmemoConfig;
pub use env::Environment;
pub use error::{OmemoError, SessionError};
pub use filter::{InputFilter, OutputFilter};
pub use omemo::Omemo;
pub use session::RatchetSession;
pub use state::{RatchetState, SkippedMessageKey};
pub use store::{ChaoticStore, MemoryStore, OmemoStore, RedbStore, StoreError};
pub use system_env::SystemEnv;
