//! Triple Diffie-Hellman handshake
//!
//! The initiator combines its identity and ephemeral keys with the
//! recipient's identity key and one of its published one-time pre-keys.
//! The recipient recomputes the same three agreements from its private
//! halves and the keys carried in the pre-key message.
//!
//! ```text
//! sender:   DH(I_b, E_a) ‖ DH(O_b, I_a) ‖ DH(O_b, E_a)
//! receiver: DH(E_a, I_b) ‖ DH(I_a, O_b) ‖ DH(E_a, O_b)
//! ```
//!
//! The 96-byte result seeds the root KDF.

use omemo_crypto::{CryptoError, KEY_SIZE, KeyPair};
use zeroize::{Zeroize, Zeroizing};

use crate::env::Environment;

/// Length of the concatenated handshake secret
pub const SHARED_SECRET_SIZE: usize = 3 * KEY_SIZE;

/// Fresh X25519 key pair from the environment RNG.
pub fn generate_key_pair<E: Environment>(env: &E) -> KeyPair {
    let mut seed: [u8; KEY_SIZE] = env.random_array();
    let pair = KeyPair::from_private_bytes(seed);
    seed.zeroize();
    pair
}

/// Initiator side of the handshake.
///
/// # Errors
///
/// - `InvalidKey` if a private half is missing or a peer key is malformed
pub fn sender_triple_dh(
    my_identity: &KeyPair,
    my_ephemeral: &KeyPair,
    their_identity: &[u8],
    their_one_time: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    Ok(concat([
        my_ephemeral.agree(their_identity)?,
        my_identity.agree(their_one_time)?,
        my_ephemeral.agree(their_one_time)?,
    ]))
}

/// Recipient side of the handshake.
///
/// # Errors
///
/// - `InvalidKey` if a private half is missing or a peer key is malformed
pub fn receiver_triple_dh(
    my_identity: &KeyPair,
    my_one_time: &KeyPair,
    their_identity: &[u8],
    their_base: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    Ok(concat([
        my_identity.agree(their_base)?,
        my_one_time.agree(their_identity)?,
        my_one_time.agree(their_base)?,
    ]))
}

fn concat(mut parts: [[u8; KEY_SIZE]; 3]) -> Zeroizing<Vec<u8>> {
    let mut secret = Zeroizing::new(Vec::with_capacity(SHARED_SECRET_SIZE));
    for part in &parts {
        secret.extend_from_slice(part);
    }
    parts.zeroize();
    secret
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestEnv;

    #[test]
    fn both_sides_derive_the_same_secret() {
        let env = TestEnv::new(7);
        let alice_identity = generate_key_pair(&env);
        let alice_ephemeral = generate_key_pair(&env);
        let bob_identity = generate_key_pair(&env);
        let bob_one_time = generate_key_pair(&env);

        let sender = sender_triple_dh(
            &alice_identity,
            &alice_ephemeral,
            bob_identity.public_key(),
            bob_one_time.public_key(),
        )
        .unwrap();
        let receiver = receiver_triple_dh(
            &bob_identity,
            &bob_one_time,
            alice_identity.public_key(),
            alice_ephemeral.public_key(),
        )
        .unwrap();

        assert_eq!(sender.len(), SHARED_SECRET_SIZE);
        assert_eq!(*sender, *receiver);
    }

    #[test]
    fn different_one_time_key_gives_different_secret() {
        let env = TestEnv::new(8);
        let alice_identity = generate_key_pair(&env);
        let alice_ephemeral = generate_key_pair(&env);
        let bob_identity = generate_key_pair(&env);
        let one_time_a = generate_key_pair(&env);
        let one_time_b = generate_key_pair(&env);

        let a = sender_triple_dh(
            &alice_identity,
            &alice_ephemeral,
            bob_identity.public_key(),
            one_time_a.public_key(),
        )
        .unwrap();
        let b = sender_triple_dh(
            &alice_identity,
            &alice_ephemeral,
            bob_identity.public_key(),
            one_time_b.public_key(),
        )
        .unwrap();

        assert_ne!(*a, *b);
    }

    #[test]
    fn public_only_key_cannot_run_handshake() {
        let env = TestEnv::new(9);
        let alice_identity = generate_key_pair(&env).to_public();
        let alice_ephemeral = generate_key_pair(&env);
        let bob = generate_key_pair(&env);

        let result = sender_triple_dh(
            &alice_identity,
            &alice_ephemeral,
            bob.public_key(),
            bob.public_key(),
        );
        assert!(matches!(result, Err(CryptoError::InvalidKey { .. })));
    }

    #[test]
    fn malformed_peer_key_is_rejected() {
        let env = TestEnv::new(10);
        let me = generate_key_pair(&env);

        assert!(sender_triple_dh(&me, &me, &[1u8; 5], &[2u8; 32]).is_err());
    }
}
