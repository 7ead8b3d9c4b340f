//! Fuzz target for out-of-order delivery within a chain
//!
//! Alice sends a batch; Bob receives an arbitrary sequence of indices into
//! it, including repeats.
//!
//! # Invariants
//!
//! - The first delivery of each message yields its plaintext
//! - Every repeat delivery is rejected
//! - The skipped-key cache never exceeds its configured cap

#![no_main]

use std::collections::HashSet;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use omemo_core::OmemoConfig;
use omemo_harness::{Conversation, Side, Wire};

#[derive(Debug, Arbitrary)]
struct Input {
    seed: u64,
    count: u8,
    deliveries: Vec<u8>,
}

const MAX_SKIPPED_KEYS: usize = 64;

fuzz_target!(|input: Input| {
    let config = OmemoConfig { max_skipped_keys: MAX_SKIPPED_KEYS, ..OmemoConfig::default() };
    let Ok(mut conversation) = Conversation::with_config(input.seed, config) else {
        return;
    };
    conversation.exchange(Side::Alice, b"hello").expect("handshake");
    conversation.exchange(Side::Bob, b"hi").expect("reply");

    let count = usize::from(input.count % 32) + 1;
    let wires: Vec<Wire> = (0..count)
        .map(|i| conversation.send(Side::Alice, &[i as u8]).expect("send"))
        .collect();

    let mut delivered = HashSet::new();
    for index in input.deliveries {
        let i = usize::from(index) % count;
        let result = conversation.receive(&wires[i]);

        if delivered.insert(i) {
            assert_eq!(result.expect("first delivery decrypts"), vec![i as u8]);
        } else {
            assert!(result.is_err(), "replay of message {i} accepted");
        }
        assert!(conversation.state(Side::Bob).skipped_key_count() <= MAX_SKIPPED_KEYS);
    }
});
