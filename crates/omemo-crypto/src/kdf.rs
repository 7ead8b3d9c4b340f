//! Key derivation for the Olm ratchet using HKDF-SHA256 and HMAC-SHA256
//!
//! Every derived key in the protocol comes out of this module. All functions
//! are deterministic: identical inputs produce identical outputs, which is
//! what lets two peers arrive at the same keys independently.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::{CryptoError, cipher};

type HmacSha256 = Hmac<Sha256>;

/// Info label for the initial root/chain split of the handshake secret
const ROOT_INFO: &[u8] = b"OLM_ROOT";

/// Info label for every DH ratchet step
const RATCHET_INFO: &[u8] = b"OLM_RATCHET";

/// Info label for expanding a message key into cipher/MAC/IV material
const KEYS_INFO: &[u8] = b"OLM_KEYS";

/// Domain separator for deriving a message key from a chain key
const MESSAGE_KEY_SEED: &[u8] = &[0x01];

/// Domain separator for advancing a chain key
const CHAIN_KEY_SEED: &[u8] = &[0x02];

/// Length of the truncated message MAC appended to every ratchet message
pub const MAC_SIZE: usize = 8;

/// HKDF-SHA256 extract-and-expand.
///
/// # Errors
///
/// - `KdfLength` if `length` exceeds 255 * 32 bytes
pub fn hkdf(salt: &[u8], ikm: &[u8], info: &[u8], length: usize) -> Result<Vec<u8>, CryptoError> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);

    let mut okm = vec![0u8; length];
    hkdf.expand(info, &mut okm).map_err(|_| CryptoError::KdfLength { length })?;

    Ok(okm)
}

/// HMAC-SHA256 tag over `message`.
pub fn hmac(key: &[u8], message: &[u8]) -> [u8; 32] {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(message);
    mac.finalize().into_bytes().into()
}

/// Message key for the current position of a chain.
pub fn message_key(chain_key: &[u8; 32]) -> [u8; 32] {
    hmac(chain_key, MESSAGE_KEY_SEED)
}

/// Next chain key. The caller overwrites the old chain key with this value.
pub fn next_chain_key(chain_key: &[u8; 32]) -> [u8; 32] {
    hmac(chain_key, CHAIN_KEY_SEED)
}

/// 64-byte HKDF with the output split into two halves.
fn expand_pair(salt: &[u8], ikm: &[u8], info: &[u8]) -> ([u8; 32], [u8; 32]) {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);

    let mut okm = [0u8; 64];
    let Ok(()) = hkdf.expand(info, &mut okm) else {
        unreachable!("64 bytes is a valid HKDF-SHA256 output length");
    };

    let mut first = [0u8; 32];
    let mut second = [0u8; 32];
    first.copy_from_slice(&okm[..32]);
    second.copy_from_slice(&okm[32..]);
    okm.zeroize();

    (first, second)
}

/// Root key and chain key produced together by a root KDF step.
pub struct ChainKeys {
    /// Next root key
    pub root_key: [u8; 32],
    /// First chain key of the new chain
    pub chain_key: [u8; 32],
}

impl ChainKeys {
    /// Initial split of the triple-DH secret.
    ///
    /// `HKDF(zero[64], secret, "OLM_ROOT", 64)` → root key ‖ chain key.
    pub fn from_shared_secret(secret: &[u8]) -> Self {
        let (root_key, chain_key) = expand_pair(&[0u8; 64], secret, ROOT_INFO);
        Self { root_key, chain_key }
    }

    /// DH ratchet step.
    ///
    /// `HKDF(root_key, dh_output, "OLM_RATCHET", 64)` → next root key ‖ chain key.
    pub fn ratchet(root_key: &[u8; 32], dh_output: &[u8; 32]) -> Self {
        let (root_key, chain_key) = expand_pair(root_key, dh_output, RATCHET_INFO);
        Self { root_key, chain_key }
    }
}

impl Drop for ChainKeys {
    fn drop(&mut self) {
        self.root_key.zeroize();
        self.chain_key.zeroize();
    }
}

/// Per-message cipher key, MAC key and IV.
///
/// Derived as `HKDF(zero[80], message_key, "OLM_KEYS", 80)` and split
/// 32/32/16 in that order. The byte ranges are part of the wire protocol.
pub struct MessageKeys {
    cipher_key: [u8; 32],
    mac_key: [u8; 32],
    iv: [u8; 16],
}

impl MessageKeys {
    /// Expand a message key.
    pub fn derive(message_key: &[u8; 32]) -> Self {
        let hkdf = Hkdf::<Sha256>::new(Some(&[0u8; 80]), message_key);

        let mut okm = [0u8; 80];
        let Ok(()) = hkdf.expand(KEYS_INFO, &mut okm) else {
            unreachable!("80 bytes is a valid HKDF-SHA256 output length");
        };

        let mut keys = Self { cipher_key: [0u8; 32], mac_key: [0u8; 32], iv: [0u8; 16] };
        keys.cipher_key.copy_from_slice(&okm[0..32]);
        keys.mac_key.copy_from_slice(&okm[32..64]);
        keys.iv.copy_from_slice(&okm[64..80]);
        okm.zeroize();

        keys
    }

    /// AES-256 key.
    pub fn cipher_key(&self) -> &[u8; 32] {
        &self.cipher_key
    }

    /// HMAC-SHA256 key for the message MAC.
    pub fn mac_key(&self) -> &[u8; 32] {
        &self.mac_key
    }

    /// CBC initialization vector.
    pub fn iv(&self) -> &[u8; 16] {
        &self.iv
    }

    /// Encrypt a message body.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let Ok(ciphertext) = cipher::encrypt(&self.cipher_key, &self.iv, plaintext) else {
            unreachable!("derived key and IV always have valid lengths");
        };
        ciphertext
    }

    /// Decrypt a message body. Only call after [`Self::verify_mac`] succeeded.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        cipher::decrypt(&self.cipher_key, &self.iv, ciphertext)
    }

    /// Truncated MAC over a serialized message.
    pub fn mac(&self, serialized: &[u8]) -> [u8; MAC_SIZE] {
        let full = hmac(&self.mac_key, serialized);

        let mut tag = [0u8; MAC_SIZE];
        tag.copy_from_slice(&full[..MAC_SIZE]);
        tag
    }

    /// Constant-time check of a truncated MAC.
    pub fn verify_mac(&self, serialized: &[u8], tag: &[u8]) -> bool {
        let expected = self.mac(serialized);
        tag.len() == MAC_SIZE && bool::from(expected.ct_eq(tag))
    }
}

impl Drop for MessageKeys {
    fn drop(&mut self) {
        self.cipher_key.zeroize();
        self.mac_key.zeroize();
        self.iv.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_chain_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    #[test]
    fn hkdf_matches_rfc5869_case_1() {
        let ikm = [0x0bu8; 22];
        let salt = hex::decode("000102030405060708090a0b0c").unwrap();
        let info = hex::decode("f0f1f2f3f4f5f6f7f8f9").unwrap();

        let okm = hkdf(&salt, &ikm, &info, 42).unwrap();

        assert_eq!(
            hex::encode(okm),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
        );
    }

    #[test]
    fn hkdf_rejects_oversized_output() {
        let result = hkdf(&[], b"ikm", b"info", 255 * 32 + 1);
        assert_eq!(result, Err(CryptoError::KdfLength { length: 255 * 32 + 1 }));
    }

    #[test]
    fn hmac_matches_rfc4231_case_2() {
        let tag = hmac(b"Jefe", b"what do ya want for nothing?");

        assert_eq!(
            hex::encode(tag),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn message_and_chain_keys_are_domain_separated() {
        let chain_key = test_chain_key();

        assert_eq!(message_key(&chain_key), hmac(&chain_key, &[0x01]));
        assert_eq!(next_chain_key(&chain_key), hmac(&chain_key, &[0x02]));
        assert_ne!(message_key(&chain_key), next_chain_key(&chain_key));
    }

    #[test]
    fn message_keys_split_hkdf_output_in_order() {
        let mk = message_key(&test_chain_key());
        let okm = hkdf(&[0u8; 80], &mk, b"OLM_KEYS", 80).unwrap();

        let keys = MessageKeys::derive(&mk);

        assert_eq!(keys.cipher_key(), &okm[0..32]);
        assert_eq!(keys.mac_key(), &okm[32..64]);
        assert_eq!(keys.iv(), &okm[64..80]);
    }

    #[test]
    fn root_split_matches_generic_hkdf() {
        let secret = [0x42u8; 96];
        let okm = hkdf(&[0u8; 64], &secret, b"OLM_ROOT", 64).unwrap();

        let keys = ChainKeys::from_shared_secret(&secret);

        assert_eq!(keys.root_key, okm[..32]);
        assert_eq!(keys.chain_key, okm[32..]);
    }

    #[test]
    fn ratchet_step_uses_root_key_as_salt() {
        let root_key = [0x11u8; 32];
        let dh_output = [0x22u8; 32];
        let okm = hkdf(&root_key, &dh_output, b"OLM_RATCHET", 64).unwrap();

        let keys = ChainKeys::ratchet(&root_key, &dh_output);

        assert_eq!(keys.root_key, okm[..32]);
        assert_eq!(keys.chain_key, okm[32..]);
        assert_ne!(keys.root_key, root_key, "ratchet must change the root key");
    }

    #[test]
    fn mac_roundtrip_and_tamper() {
        let keys = MessageKeys::derive(&message_key(&test_chain_key()));
        let body = b"serialized message";

        let tag = keys.mac(body);
        assert!(keys.verify_mac(body, &tag));

        let mut tampered = tag;
        tampered[0] ^= 0x01;
        assert!(!keys.verify_mac(body, &tampered));
        assert!(!keys.verify_mac(b"other message", &tag));
        assert!(!keys.verify_mac(body, &tag[..4]));
    }

    #[test]
    fn derivation_is_deterministic() {
        let mk = message_key(&test_chain_key());
        let a = MessageKeys::derive(&mk);
        let b = MessageKeys::derive(&mk);

        assert_eq!(a.cipher_key(), b.cipher_key());
        assert_eq!(a.mac_key(), b.mac_key());
        assert_eq!(a.iv(), b.iv());
    }

    #[test]
    fn message_keys_encrypt_decrypt_roundtrip() {
        let keys = MessageKeys::derive(&message_key(&test_chain_key()));

        let ciphertext = keys.encrypt(b"hello olm");
        assert_eq!(keys.decrypt(&ciphertext).unwrap(), b"hello olm");
    }
}
