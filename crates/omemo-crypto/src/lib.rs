//! Olm Cryptographic Primitives
//!
//! Cryptographic building blocks for the Olm double ratchet. Pure functions
//! with deterministic outputs. Callers provide random bytes for key
//! generation so tests can reproduce exact key material.
//!
//! # Key Lifecycle
//!
//! ```text
//! Triple-DH shared secret
//!        │
//!        ▼ HKDF(0, secret, "OLM_ROOT")
//! Root Key ‖ Chain Key
//!        │
//!        ├── DH ratchet: HKDF(root, DH(ours, theirs), "OLM_RATCHET")
//!        │               → next Root Key ‖ next Chain Key
//!        ▼
//! Chain Key ──HMAC(ck, 0x02)──▶ next Chain Key
//!        │
//!        ▼ HMAC(ck, 0x01)
//! Message Key
//!        │
//!        ▼ HKDF(0, mk, "OLM_KEYS")
//! AES Key ‖ HMAC Key ‖ IV
//! ```
//!
//! # Security
//!
//! - Message keys are single use; the chain key is overwritten after every
//!   message.
//! - Message authentication uses HMAC-SHA256 truncated to 8 bytes, compared in
//!   constant time.
//! - Private key halves and derived keys are zeroized on drop.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cipher;
mod error;
pub mod kdf;
pub mod keys;

pub use error::CryptoError;
pub use kdf::{ChainKeys, MAC_SIZE, MessageKeys};
pub use keys::{KEY_SIZE, KeyPair, agree};
