//! Fuzz target for PreKeyMessage::decode
//!
//! The inner message field is decoded too, since a receiver hands it
//! straight to the ratchet.

#![no_main]

use libfuzzer_sys::fuzz_target;
use omemo_proto::{OlmMessage, PreKeyMessage, split_mac};

fuzz_target!(|data: &[u8]| {
    let Ok(message) = PreKeyMessage::decode(data) else {
        return;
    };

    assert_eq!(message.to_bytes().expect("decoded message re-encodes"), data);

    if let Ok((body, _)) = split_mac(&message.message) {
        let _ = OlmMessage::decode(body);
    }
});
