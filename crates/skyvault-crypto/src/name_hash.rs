//! Deterministic name hashing
//!
//! Every file and directory name is sent to the server twice: encrypted
//! (for display after decryption) and as a deterministic case-folded hash
//! (so the server can look items up without learning the name).

use crate::hashing::{hmac_sha256, sha1, sha512};
use crate::KEY_SIZE;

/// Hash a name for v1/v2 accounts.
///
/// The wire rule is `sha1(hex(sha512(lower(name))))`: the outer SHA-1 runs
/// over the ASCII hex encoding of the inner digest.
pub fn hash_name_v2(name: &str) -> String {
    let lower = name.to_lowercase();
    let inner = hex::encode(sha512(lower.as_bytes()));
    hex::encode(sha1(inner.as_bytes()))
}

/// Hash a name for v3 accounts: HMAC-SHA256 under the account's dedicated
/// name-hash key.
pub fn hash_name_v3(key: &[u8; KEY_SIZE], name: &str) -> String {
    let lower = name.to_lowercase();
    hex::encode(hmac_sha256(key, lower.as_bytes()))
}

/// Derive the dedicated v3 name-hash key from the DEK.
///
/// Deterministic, so a fresh login and a restored session agree on every
/// hash without the key ever being stored server-side.
pub fn derive_name_hash_key(dek: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
    hmac_sha256(dek, b"name-hash-key")
}
