//! End-to-end device manager flows in a seeded environment
//!
//! Several devices publish device lists and bundles to each other, then
//! exchange envelopes, with deliveries reordered where the test says so.

use omemo_core::{InputFilter, MemoryStore, Omemo, OmemoConfig, OmemoError, OutputFilter};
use omemo_harness::SimEnv;
use omemo_proto::{BundleDocument, ChatMessage, DeviceListDocument, EncryptedEnvelope, PeerId};
use proptest::prelude::*;

type Device = Omemo<MemoryStore, SimEnv>;

fn device(env: &SimEnv) -> Device {
    Omemo::new(MemoryStore::new(), env.clone(), OmemoConfig::default()).unwrap()
}

/// Every device learns every other device's list entry and bundle.
fn publish_all(devices: &[(&PeerId, &Device)]) {
    let lists: Vec<DeviceListDocument> =
        devices.iter().map(|(peer, device)| device.device_list(peer)).collect();
    let bundles: Vec<BundleDocument> =
        devices.iter().map(|(_, device)| device.bundle_document().unwrap()).collect();

    for (_, device) in devices {
        for list in &lists {
            device.handle_device_list(list).unwrap();
        }
        for bundle in &bundles {
            device.handle_bundle(bundle).unwrap();
        }
    }
}

#[test]
fn message_fans_out_to_every_recipient_device() {
    let env = SimEnv::with_seed(100);
    let alice = PeerId::from("alice@example.org");
    let bob = PeerId::from("bob@example.org");
    let alice_phone = device(&env);
    let bob_phone = device(&env);
    let bob_laptop = device(&env);

    // Bob's devices advertise themselves separately; the lists accumulate
    publish_all(&[(&alice, &alice_phone), (&bob, &bob_phone), (&bob, &bob_laptop)]);

    let envelope = alice_phone.encrypt(&[bob.clone()], b"to both of you").unwrap();
    assert_eq!(envelope.keys.len(), 2);
    assert!(envelope.keys.iter().all(|key| key.pre_key));

    assert_eq!(bob_phone.decrypt(&envelope).unwrap(), b"to both of you");
    assert_eq!(bob_laptop.decrypt(&envelope).unwrap(), b"to both of you");

    // Bob's devices know each other too, but never encrypt to themselves
    let reply = bob_phone.encrypt(&[alice.clone(), bob], b"reply").unwrap();
    let recipients: Vec<_> = reply.keys.iter().map(|key| key.recipient_device_id).collect();
    assert!(recipients.contains(&alice_phone.device_id()));
    assert!(recipients.contains(&bob_laptop.device_id()));
    assert!(!recipients.contains(&bob_phone.device_id()));

    assert_eq!(alice_phone.decrypt(&reply).unwrap(), b"reply");
}

#[test]
fn group_conversation_over_filters() {
    let env = SimEnv::with_seed(101);
    let peers = [PeerId::from("alice"), PeerId::from("bob"), PeerId::from("carol")];
    let devices = [device(&env), device(&env), device(&env)];
    publish_all(&[(&peers[0], &devices[0]), (&peers[1], &devices[1]), (&peers[2], &devices[2])]);

    for round in 0..6 {
        let sender = round % 3;
        let recipients: Vec<PeerId> =
            (0..3).filter(|&i| i != sender).map(|i| peers[i].clone()).collect();
        let body = format!("round {round} from {}", peers[sender]);

        let mut message = ChatMessage::new(peers[sender].clone(), recipients, body.clone());
        assert!(devices[sender].output(&mut message).unwrap());

        for receiver in (0..3).filter(|&i| i != sender) {
            let mut inbound = message.clone();
            assert!(devices[receiver].input(&mut inbound).unwrap());
            assert_eq!(inbound.body.as_deref(), Some(body.as_str()));
        }
    }
}

#[test]
fn unknown_pre_key_without_session_is_no_matching_session() {
    let env = SimEnv::with_seed(102);
    let alice = PeerId::from("alice");
    let bob = PeerId::from("bob");
    let alice_phone = device(&env);
    let bob_phone = device(&env);
    publish_all(&[(&alice, &alice_phone), (&bob, &bob_phone)]);

    // A fresh device never published the pre-key Alice picked
    let envelope = alice_phone.encrypt(&[bob], b"lost").unwrap();
    let mut rewritten = envelope.clone();
    let reinstalled = device(&env);
    rewritten.keys[0].recipient_device_id = reinstalled.device_id();

    let err = reinstalled.decrypt(&rewritten).unwrap_err();
    assert!(matches!(err, OmemoError::NoMatchingSession { .. }));
}

#[test]
fn bundle_republished_after_pre_key_use() {
    let env = SimEnv::with_seed(103);
    let alice = PeerId::from("alice");
    let bob = PeerId::from("bob");
    let alice_phone = device(&env);
    let bob_phone = device(&env);
    publish_all(&[(&alice, &alice_phone), (&bob, &bob_phone)]);
    let published = bob_phone.take_bundle_publish().unwrap().unwrap();

    let envelope = alice_phone.encrypt(&[bob], b"uses a pre-key").unwrap();
    assert!(bob_phone.take_bundle_publish().unwrap().is_none());
    bob_phone.decrypt(&envelope).unwrap();

    let republished = bob_phone.take_bundle_publish().unwrap().unwrap();
    assert_ne!(republished, published);
    assert_eq!(republished.pre_keys.len(), published.pre_keys.len());
    assert_eq!(republished.identity_key, published.identity_key);
}

#[test]
fn prop_reordered_envelopes_all_decrypt() {
    proptest!(ProptestConfig::with_cases(32), |(
        seed in any::<u64>(),
        order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle(),
        replies in any::<bool>(),
    )| {
        let env = SimEnv::with_seed(seed);
        let alice = PeerId::from("alice");
        let bob = PeerId::from("bob");
        let alice_phone = device(&env);
        let bob_phone = device(&env);
        publish_all(&[(&alice, &alice_phone), (&bob, &bob_phone)]);

        if replies {
            let hello = alice_phone.encrypt(&[bob.clone()], b"hello").unwrap();
            bob_phone.decrypt(&hello).unwrap();
            let reply = bob_phone.encrypt(&[alice.clone()], b"hi").unwrap();
            alice_phone.decrypt(&reply).unwrap();
        }

        let envelopes: Vec<EncryptedEnvelope> = (0..6u8)
            .map(|i| alice_phone.encrypt(&[bob.clone()], &[i; 4]).unwrap())
            .collect();
        prop_assert!(envelopes.iter().all(|e| e.keys[0].pre_key != replies));

        for i in order {
            prop_assert_eq!(bob_phone.decrypt(&envelopes[i]).unwrap(), vec![i as u8; 4]);
        }

        // Replays after the fact are all refused
        for envelope in &envelopes {
            prop_assert!(bob_phone.decrypt(envelope).is_err());
        }
    });
}
