//! AES-256-CBC with PKCS7 padding
//!
//! The cipher is unauthenticated on its own. Ratchet messages carry a
//! truncated HMAC that is verified before [`decrypt`] is ever called.

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};

use crate::CryptoError;

/// AES-256 key length in bytes
pub const CIPHER_KEY_SIZE: usize = 32;

/// AES block size and CBC IV length in bytes
pub const IV_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Encrypt `plaintext` under `key` and `iv`.
///
/// Output is always a non-empty multiple of 16 bytes; an exactly
/// block-aligned input gains a full padding block.
///
/// # Errors
///
/// - `InvalidKey` if `key` is not 32 bytes or `iv` is not 16 bytes
pub fn encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let encryptor = Aes256CbcEnc::new_from_slices(key, iv)
        .map_err(|_| invalid_lengths(key.len(), iv.len()))?;

    Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Decrypt `ciphertext` and strip its PKCS7 padding.
///
/// # Errors
///
/// - `InvalidKey` if `key` is not 32 bytes or `iv` is not 16 bytes
/// - `Padding` if the ciphertext is not block aligned or the padding is
///   malformed
pub fn decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let decryptor = Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|_| invalid_lengths(key.len(), iv.len()))?;

    decryptor.decrypt_padded_vec_mut::<Pkcs7>(ciphertext).map_err(|_| CryptoError::Padding)
}

fn invalid_lengths(key_len: usize, iv_len: usize) -> CryptoError {
    CryptoError::invalid_key(format!(
        "AES-256-CBC needs a {CIPHER_KEY_SIZE}-byte key and {IV_SIZE}-byte IV, got {key_len} and {iv_len}"
    ))
}
