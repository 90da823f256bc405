//! Password key derivation
//!
//! Each auth version derives its own key material and login token from the
//! account password and the server-stored salt:
//! - v2: PBKDF2-HMAC-SHA512 with 200,000 iterations
//! - v3: Argon2id (t=3, m=64 MiB, p=4)
//!
//! The auth token is what actually reaches `/v3/login`; the password and
//! the derived keys never leave the client.

use crate::{error::Result, hashing::sha512, CryptoError, KEY_SIZE, MASTER_KEY_SIZE};
use argon2::{Algorithm, Argon2, Params, Version};
use sha2::{Digest, Sha512};

/// Derive the v2 master key and auth token from the password.
///
/// PBKDF2 yields 64 bytes, hex-encoded to a 128-character string. The first
/// 64 hex characters, as raw ASCII bytes, are the master key; the last 64
/// are hashed with SHA-512 and hex-encoded to form the auth token.
pub fn derive_v2(password: &str, salt: &str) -> ([u8; MASTER_KEY_SIZE], String) {
    let mut derived = [0u8; 64];
    pbkdf2::pbkdf2_hmac::<Sha512>(password.as_bytes(), salt.as_bytes(), 200_000, &mut derived);
    let derived_hex = hex::encode(derived);

    let mut master_key = [0u8; MASTER_KEY_SIZE];
    master_key.copy_from_slice(&derived_hex.as_bytes()[..MASTER_KEY_SIZE]);

    let auth_token = hex::encode(sha512(&derived_hex.as_bytes()[MASTER_KEY_SIZE..]));
    (master_key, auth_token)
}

/// Derive the v3 key-encryption key and auth token from the password.
///
/// Argon2id yields 64 bytes; the first 32 are the KEK, the last 32 are
/// hex-encoded to form the auth token.
pub fn derive_v3(password: &str, salt: &str) -> Result<([u8; KEY_SIZE], String)> {
    let params = Params::new(65536, 3, 4, Some(64)).map_err(|e| CryptoError::Kdf(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut derived = [0u8; 64];
    argon2
        .hash_password_into(password.as_bytes(), salt.as_bytes(), &mut derived)
        .map_err(|e| CryptoError::Kdf(e.to_string()))?;

    let mut kek = [0u8; KEY_SIZE];
    kek.copy_from_slice(&derived[..KEY_SIZE]);
    Ok((kek, hex::encode(&derived[KEY_SIZE..])))
}

/// The legacy OpenSSL `EVP_BytesToKey` schedule with MD5.
///
/// Iterates `digest = MD5(prev_digest ‖ password ‖ salt)` until enough
/// material exists, then splits it into key and IV. Only used to decrypt
/// v1 envelopes.
pub fn evp_bytes_to_key_md5(
    password: &[u8],
    salt: &[u8],
    key_len: usize,
    iv_len: usize,
) -> (Vec<u8>, Vec<u8>) {
    let mut material = Vec::with_capacity(key_len + iv_len);
    let mut prev: Vec<u8> = Vec::new();
    while material.len() < key_len + iv_len {
        let mut hasher = md5::Md5::new();
        hasher.update(&prev);
        hasher.update(password);
        hasher.update(salt);
        prev = hasher.finalize().to_vec();
        material.extend_from_slice(&prev);
    }
    let iv = material[key_len..key_len + iv_len].to_vec();
    material.truncate(key_len);
    (material, iv)
}
