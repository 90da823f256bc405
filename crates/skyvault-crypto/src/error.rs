//! Error types for the skyvault-crypto crate

use thiserror::Error;

/// Result type alias using `CryptoError`
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    /// AEAD open failed: the ciphertext or tag was tampered with, or the
    /// wrong key was used
    #[error("authentication failed: tag mismatch")]
    AuthTag,

    /// A key had the wrong length for its format
    #[error("key length wrong: expected {expected} bytes, got {actual}")]
    KeyLength { expected: usize, actual: usize },

    /// The envelope prefix matched none of the known wire formats
    #[error("unknown envelope version")]
    UnknownEnvelopeVersion,

    /// The envelope carried a known prefix but was otherwise malformed
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// CBC plaintext carried an out-of-range PKCS#7 padding length
    #[error("invalid padding size")]
    PaddingInvalid,

    /// Every key in the master key chain failed to decrypt the envelope
    #[error("all keys failed: {0:?}")]
    AllKeysFailed(Vec<CryptoError>),

    /// The master key chain has no members
    #[error("master key chain is empty")]
    EmptyKeyChain,

    /// AEAD seal failed
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Metadata encryption was requested for an auth version that only
    /// supports decryption
    #[error("metadata encryption unsupported for auth version {0}")]
    UnsupportedVersion(u32),

    /// Key derivation failed
    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// RSA key parsing or serialization failed
    #[error("rsa key error: {0}")]
    Rsa(String),

    /// The account public key does not belong to the private key
    #[error("public and private key mismatch")]
    KeyPairMismatch,

    /// Base64 decode error
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Hex decode error
    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Decrypted metadata was not valid UTF-8
    #[error("decrypted metadata is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}
