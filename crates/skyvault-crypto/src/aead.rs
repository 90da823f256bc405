//! Standalone AES-256-GCM seal/open
//!
//! One-shot helpers keyed by raw bytes. The key types
//! ([`crate::MasterKey`], [`crate::EncryptionKey`]) carry a prepared cipher
//! state instead and should be preferred on hot paths; these exist for
//! callers holding nothing but key material.

use crate::{error::Result, CryptoError, KEY_SIZE, NONCE_SIZE};
use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit, Nonce};

/// Seal `plaintext`, returning `ciphertext ‖ tag`.
pub fn aead_seal(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key).expect("key is 32 bytes");
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))
}

/// Open `ciphertext ‖ tag`; any tampering yields [`CryptoError::AuthTag`].
pub fn aead_open(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], sealed: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key).expect("key is 32 bytes");
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| CryptoError::AuthTag)
}
