//! Fuzz target for OlmMessage::decode
//!
//! Arbitrary bytes, split into message and MAC the way a receiver would.
//! Decoding must never panic, and anything that decodes must encode back to
//! the exact same bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use omemo_proto::{OlmMessage, split_mac};

fuzz_target!(|data: &[u8]| {
    let Ok((body, _mac)) = split_mac(data) else {
        return;
    };

    if let Ok(message) = OlmMessage::decode(body) {
        let encoded = message.to_bytes().expect("decoded message re-encodes");
        assert_eq!(encoded, body);
        assert_eq!(message.encoded_len(), body.len());
    }
});
