//! Curve25519 key pairs and Diffie-Hellman agreement

use std::fmt;

use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::CryptoError;

/// Size of X25519 public keys, private keys and agreement outputs
pub const KEY_SIZE: usize = 32;

/// An X25519 key pair.
///
/// Immutable once generated. Key pairs received from a peer (bundle identity
/// keys, one-time pre-keys) carry only the public half.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    public_key: [u8; KEY_SIZE],
    private_key: Option<[u8; KEY_SIZE]>,
}

impl KeyPair {
    /// Build a key pair from 32 bytes of caller-provided randomness.
    ///
    /// The bytes become the private scalar (clamped at use by X25519). Callers
    /// MUST provide cryptographically secure random bytes in production.
    pub fn from_private_bytes(mut private_key: [u8; KEY_SIZE]) -> Self {
        let secret = StaticSecret::from(private_key);
        private_key.zeroize();

        let public_key = PublicKey::from(&secret).to_bytes();
        Self { public_key, private_key: Some(secret.to_bytes()) }
    }

    /// Public-only key pair for key material received from a peer.
    pub fn from_public(public_key: [u8; KEY_SIZE]) -> Self {
        Self { public_key, private_key: None }
    }

    /// Public-only key pair from untrusted bytes.
    pub fn from_public_slice(public_key: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self::from_public(to_key(public_key, "public key")?))
    }

    /// Public half.
    pub fn public_key(&self) -> &[u8; KEY_SIZE] {
        &self.public_key
    }

    /// Private half. `None` for peer keys.
    pub fn private_key(&self) -> Option<&[u8; KEY_SIZE]> {
        self.private_key.as_ref()
    }

    /// Whether this pair holds its private half.
    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    /// Copy of this key pair without the private half.
    pub fn to_public(&self) -> Self {
        Self::from_public(self.public_key)
    }

    /// Diffie-Hellman agreement between our private half and `their_public`.
    pub fn agree(&self, their_public: &[u8]) -> Result<[u8; KEY_SIZE], CryptoError> {
        let private_key = self
            .private_key
            .as_ref()
            .ok_or_else(|| CryptoError::invalid_key("key pair has no private half"))?;

        agree(their_public, private_key)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &self.private_key.map(|_| "<redacted>"))
            .finish()
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        if let Some(private_key) = self.private_key.as_mut() {
            private_key.zeroize();
        }
    }
}

/// Raw X25519 agreement.
///
/// # Errors
///
/// - `InvalidKey` if either key is not 32 bytes
/// - `InvalidKey` if the public key is a low-order point (all-zero output)
pub fn agree(public_key: &[u8], private_key: &[u8]) -> Result<[u8; KEY_SIZE], CryptoError> {
    let public = PublicKey::from(to_key(public_key, "public key")?);
    let mut private = to_key(private_key, "private key")?;

    let secret = StaticSecret::from(private);
    private.zeroize();

    let shared = secret.diffie_hellman(&public);
    if !shared.was_contributory() {
        return Err(CryptoError::invalid_key("non-contributory public key"));
    }

    Ok(shared.to_bytes())
}

fn to_key(bytes: &[u8], what: &str) -> Result<[u8; KEY_SIZE], CryptoError> {
    bytes.try_into().map_err(|_| {
        CryptoError::invalid_key(format!("{what}: expected {KEY_SIZE} bytes, got {}", bytes.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_key(hex_str: &str) -> [u8; KEY_SIZE] {
        hex::decode(hex_str).unwrap().try_into().unwrap()
    }

    // RFC 7748 section 6.1
    const ALICE_PRIVATE: &str = "77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a";
    const ALICE_PUBLIC: &str = "8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a";
    const BOB_PRIVATE: &str = "5dab087e624a8a4b79e17f8b83800ee66f3bb1292618b6fd1c2f8b27ff88e0eb";
    const BOB_PUBLIC: &str = "de9edb7d7b7dc1b4d35b61c2ece435373f8343c85b78674dadfc7e146f882b4f";
    const SHARED: &str = "4a5d9d5ba4ce2de1728e3bf480350f25e07e21c947d19e3376f09b3c1e161742";

    #[test]
    fn public_key_matches_rfc7748() {
        let alice = KeyPair::from_private_bytes(decode_key(ALICE_PRIVATE));
        let bob = KeyPair::from_private_bytes(decode_key(BOB_PRIVATE));

        assert_eq!(alice.public_key(), &decode_key(ALICE_PUBLIC));
        assert_eq!(bob.public_key(), &decode_key(BOB_PUBLIC));
    }

    #[test]
    fn agreement_matches_rfc7748() {
        let alice = KeyPair::from_private_bytes(decode_key(ALICE_PRIVATE));
        let bob = KeyPair::from_private_bytes(decode_key(BOB_PRIVATE));

        let ab = alice.agree(bob.public_key()).unwrap();
        let ba = bob.agree(alice.public_key()).unwrap();

        assert_eq!(ab, decode_key(SHARED));
        assert_eq!(ab, ba, "agreement must be symmetric");
    }

    #[test]
    fn different_randomness_produces_different_keys() {
        let a = KeyPair::from_private_bytes([1u8; KEY_SIZE]);
        let b = KeyPair::from_private_bytes([2u8; KEY_SIZE]);

        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn public_only_pair_cannot_agree() {
        let bob = KeyPair::from_private_bytes(decode_key(BOB_PRIVATE));
        let public_only = bob.to_public();

        assert!(!public_only.has_private_key());
        assert!(matches!(
            public_only.agree(&decode_key(ALICE_PUBLIC)),
            Err(CryptoError::InvalidKey { .. })
        ));
    }

    #[test]
    fn wrong_length_keys_are_rejected() {
        let alice = KeyPair::from_private_bytes(decode_key(ALICE_PRIVATE));

        assert!(matches!(alice.agree(&[0u8; 31]), Err(CryptoError::InvalidKey { .. })));
        assert!(matches!(agree(&[9u8; 32], &[1u8; 33]), Err(CryptoError::InvalidKey { .. })));
        assert!(KeyPair::from_public_slice(&[]).is_err());
    }

    #[test]
    fn low_order_public_key_is_rejected() {
        let alice = KeyPair::from_private_bytes(decode_key(ALICE_PRIVATE));

        let result = alice.agree(&[0u8; KEY_SIZE]);
        assert!(matches!(result, Err(CryptoError::InvalidKey { reason }) if reason.contains("contributory")));
    }

    #[test]
    fn debug_redacts_private_key() {
        let pair = KeyPair::from_private_bytes([7u8; KEY_SIZE]);
        let rendered = format!("{pair:?}");

        assert!(rendered.contains("<redacted>"));
    }
}
