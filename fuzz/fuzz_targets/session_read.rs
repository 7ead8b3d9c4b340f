//! Fuzz target for RatchetSession::read_message
//!
//! # Strategy
//!
//! - Establish a conversation from a fuzzed seed
//! - Deliver either raw fuzz bytes or a genuine message with bytes flipped
//!
//! # Invariants
//!
//! - Reading never panics
//! - A rejected message leaves the receiver's state byte-for-byte unchanged
//! - A message with a flipped bit in its MAC-covered bytes is never accepted

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use omemo_harness::{Conversation, Side, Wire};

#[derive(Debug, Arbitrary)]
enum Delivery {
    Raw { pre_key: bool, bytes: Vec<u8> },
    Tampered { established: bool, position: u16, flip: u8 },
}

#[derive(Debug, Arbitrary)]
struct Input {
    seed: u64,
    delivery: Delivery,
}

fuzz_target!(|input: Input| {
    let Ok(mut conversation) = Conversation::new(input.seed) else {
        return;
    };

    let mut forged = false;
    let wire = match input.delivery {
        Delivery::Raw { pre_key, bytes } => Wire { from: Side::Alice, pre_key, bytes },
        Delivery::Tampered { established, position, flip } => {
            if established {
                let _ = conversation.exchange(Side::Alice, b"hello");
                let _ = conversation.exchange(Side::Bob, b"hi");
            }
            let Ok(mut wire) = conversation.send(Side::Alice, b"payload") else {
                return;
            };
            if flip == 0 || wire.bytes.is_empty() {
                return;
            }
            let i = usize::from(position) % wire.bytes.len();
            wire.bytes[i] ^= flip;
            // Outer pre-key fields are not covered by the ratchet MAC
            forged = !wire.pre_key;
            wire
        }
    };

    let before = conversation.state(Side::Bob).to_bytes().expect("state encodes");
    if conversation.receive(&wire).is_err() {
        let after = conversation.state(Side::Bob).to_bytes().expect("state encodes");
        assert_eq!(before, after, "rejected message changed state");
    } else {
        assert!(!forged, "tampered message accepted");
    }
});
