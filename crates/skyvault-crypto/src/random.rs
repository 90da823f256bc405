//! Cryptographically secure randomness

use rand::{rngs::OsRng, Rng, RngCore};

const ALNUM: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Fill a fixed-size array with random bytes from the OS CSPRNG.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Generate a random alphanumeric string over `[a-zA-Z0-9]`.
///
/// The ASCII bytes of the result double as raw key material in the v1/v2
/// formats: a 32-character string IS a 32-byte file key.
pub fn random_alnum_string(length: usize) -> String {
    let mut rng = OsRng;
    let bytes: Vec<u8> = (0..length)
        .map(|_| ALNUM[rng.gen_range(0..ALNUM.len())])
        .collect();
    // the alphabet is pure ASCII
    String::from_utf8(bytes).expect("alphanumeric alphabet is valid UTF-8")
}
