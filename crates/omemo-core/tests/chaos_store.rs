//! Chaos property tests for the device manager
//!
//! Bob's store is wrapped in `ChaoticStore`. Whatever fails, a decrypt either
//! returns the right plaintext or a store error, and the sessions left in the
//! inner store stay usable.

use omemo_core::{
    ChaoticStore, MemoryStore, Omemo, OmemoConfig, OmemoError, OmemoStore, SystemEnv,
};
use omemo_proto::PeerId;
use proptest::prelude::*;

fn connect<S: OmemoStore, T: OmemoStore>(alice: &Omemo<S, SystemEnv>, bob: &Omemo<T, SystemEnv>) {
    let bob_peer = PeerId::from("bob");
    alice.handle_device_list(&bob.device_list(&bob_peer)).unwrap();
    alice.handle_bundle(&bob.bundle_document().unwrap()).unwrap();
}

#[test]
fn prop_chaotic_decrypt_never_corrupts_sessions() {
    proptest!(ProptestConfig::with_cases(32), |(
        failure_rate in 0.0..0.7,
        seed in any::<u64>(),
        message_count in 1usize..12,
    )| {
        let env = SystemEnv::new();
        let bob_store = MemoryStore::new();
        let alice = Omemo::new(MemoryStore::new(), env, OmemoConfig::default()).unwrap();
        let bob = Omemo::new(bob_store.clone(), env, OmemoConfig::default()).unwrap();
        connect(&alice, &bob);

        let chaotic = ChaoticStore::with_seed(bob_store.clone(), failure_rate, seed);
        let flaky_bob = (0..1000)
            .find_map(|_| Omemo::new(chaotic.clone(), env, OmemoConfig::default()).ok())
            .unwrap();

        let bob_peer = PeerId::from("bob");
        for i in 0..message_count {
            let plaintext = format!("message {i}");
            let envelope = alice.encrypt(&[bob_peer.clone()], plaintext.as_bytes()).unwrap();

            match flaky_bob.decrypt(&envelope) {
                Ok(decrypted) => prop_assert_eq!(decrypted, plaintext.into_bytes()),
                Err(OmemoError::Store(_)) => {},
                Err(e) => panic!("Unexpected error: {e:?}"),
            }
        }

        // ORACLE: the inner store still accepts Alice's next message
        let envelope = alice.encrypt(&[bob_peer], b"after chaos").unwrap();
        prop_assert_eq!(bob.decrypt(&envelope).unwrap(), b"after chaos".to_vec());
    });
}

#[test]
fn chaotic_store_counts_operations() {
    let env = SystemEnv::new();
    let store = ChaoticStore::new(MemoryStore::new(), 0.0);
    let omemo = Omemo::new(store.clone(), env, OmemoConfig::default()).unwrap();

    let before = store.operation_count();
    omemo.bundle_document().unwrap();

    assert_eq!(store.operation_count(), before + 1);
}
