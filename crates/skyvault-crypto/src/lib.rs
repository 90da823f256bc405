//! # SkyVault Crypto
//!
//! Cryptographic core for the SkyVault end-to-end-encrypted storage SDK.
//!
//! There are two kinds of protected data:
//! - **Metadata**: small strings (file metadata JSON, directory names),
//!   carried on the wire as self-describing [`EncryptedString`] envelopes.
//! - **Data**: file content, encrypted chunk by chunk as
//!   `nonce ‖ ciphertext ‖ tag`.
//!
//! Three wire formats coexist:
//! - **v1**: legacy Salted-OpenSSL AES-256-CBC envelopes (decode only)
//! - **v2**: AES-256-GCM under a chain of 64-byte master keys
//! - **v3**: AES-256-GCM under a 32-byte KEK/DEK pair, with HMAC-based
//!   name hashing
//!
//! All key material is derived from the account password; the server never
//! sees a key or a plaintext name.

pub mod aead;
pub mod encryption_key;
pub mod envelope;
pub mod error;
pub mod hashing;
pub mod kdf;
pub mod master_key;
pub mod name_hash;
pub mod random;
pub mod rsa_keys;

pub use aead::{aead_open, aead_seal};
pub use encryption_key::EncryptionKey;
pub use envelope::{EncryptedString, EnvelopeVersion};
pub use error::{CryptoError, Result};
pub use kdf::{derive_v2, derive_v3, evp_bytes_to_key_md5};
pub use master_key::{MasterKey, MasterKeyChain};
pub use name_hash::{derive_name_hash_key, hash_name_v2, hash_name_v3};
pub use random::{random_alnum_string, random_bytes};
pub use rsa_keys::AccountKeyPair;

/// Size of a symmetric key in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// Size of a raw master key in bytes.
pub const MASTER_KEY_SIZE: usize = 64;

/// Size of an AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Size of an AES-GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;
