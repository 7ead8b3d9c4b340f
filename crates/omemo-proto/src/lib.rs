//! OMEMO Wire Protocol
//!
//! Two layers of encoding live here:
//!
//! - The Olm binary format for ratchet messages ([`OlmMessage`]) and handshake
//!   messages ([`PreKeyMessage`]). A fixed sequence of one-byte tags, each
//!   followed by either a length-prefixed byte string or a raw integer.
//!   Integers are 4-byte little-endian.
//! - CBOR documents for what travels around the ratchet: the per-recipient
//!   [`EncryptedEnvelope`] and the published [`BundleDocument`].
//!
//! # Olm Layout
//!
//! ```text
//! OlmMessage:
//! ┌─────────┬──────┬──────┬─────────────┬──────┬───────┬──────┬──────┬────────────┐
//! │ version │ 0x0a │ len  │ ratchet key │ 0x10 │ index │ 0x22 │ len  │ ciphertext │
//! │ 1 byte  │      │ u32  │             │      │  u32  │      │ u32  │            │
//! └─────────┴──────┴──────┴─────────────┴──────┴───────┴──────┴──────┴────────────┘
//!
//! PreKeyMessage:
//! version ‖ 0x0a one-time key ‖ 0x12 base key ‖ 0x1a identity key ‖ 0x22 message
//! ```
//!
//! On the wire an `OlmMessage` is always followed by an 8-byte truncated MAC.
//! A `PreKeyMessage` carries that `message ‖ mac` pair in its `message` field.
//!
//! # Invariants
//!
//! - Decoding is strict: every tag must match its position, the version must
//!   be [`PROTOCOL_VERSION`], and no bytes may follow the last field.
//! - `decode(encode(m)) == m` for every message with a supported version.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bundle;
mod cbor;
mod codec;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod message;
pub mod prekey;
pub mod tag;

pub use bundle::{BundleDocument, DeviceListDocument, PreKeyPublic};
pub use cbor::MAX_DOCUMENT_SIZE;
pub use codec::MAX_FIELD_SIZE;
pub use envelope::{ChatMessage, EncryptedEnvelope, HeaderKey};
pub use errors::{ProtocolError, Result};
pub use ids::{DeviceId, PeerId};
pub use message::{MAC_LENGTH, OlmMessage, split_mac};
pub use prekey::PreKeyMessage;
pub use tag::PROTOCOL_VERSION;
