//! Fixed field tags of the Olm binary format
//!
//! Tags are scoped per message shape: `RATCHET_KEY` and `ONE_TIME_KEY` share
//! a value, as do `CIPHERTEXT` and `MESSAGE`.

/// Leading version byte of every Olm message
pub const PROTOCOL_VERSION: u8 = 0x03;

/// `PreKeyMessage`: one-time pre-key the sender picked from our bundle
pub const ONE_TIME_KEY: u8 = 0x0a;

/// `PreKeyMessage`: sender's ephemeral (base) key
pub const BASE_KEY: u8 = 0x12;

/// `PreKeyMessage`: sender's identity key
pub const IDENTITY_KEY: u8 = 0x1a;

/// `PreKeyMessage`: embedded `OlmMessage ‖ mac`
pub const MESSAGE: u8 = 0x22;

/// `OlmMessage`: sender's current ratchet public key
pub const RATCHET_KEY: u8 = 0x0a;

/// `OlmMessage`: position in the sending chain (raw u32, no length prefix)
pub const CHAIN_INDEX: u8 = 0x10;

/// `OlmMessage`: AES-CBC ciphertext
pub const CIPHERTEXT: u8 = 0x22;
