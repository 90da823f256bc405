//! 32-byte AES-256-GCM keys
//!
//! [`EncryptionKey`] covers every 32-byte key in the system: the v3 KEK and
//! DEK, and the per-file content keys of all versions. v1/v2 file keys are
//! the raw ASCII bytes of a 32-character alphanumeric string; v3 keys are
//! 32 random bytes stored hex-encoded.

use crate::{
    envelope::{EncryptedString, EnvelopeVersion},
    error::Result,
    random::{random_alnum_string, random_bytes},
    CryptoError, KEY_SIZE, NONCE_SIZE,
};
use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit, Nonce};
use zeroize::Zeroize;

/// A 32-byte symmetric key with its prepared AES-256-GCM state.
#[derive(Clone)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
    cipher: Aes256Gcm,
}

impl EncryptionKey {
    /// Build a key from 32 raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        let cipher = Aes256Gcm::new_from_slice(&bytes).expect("key is 32 bytes");
        Self { bytes, cipher }
    }

    /// Decode a hex-encoded 64-character key string (v3 storage form).
    pub fn from_hex(key: &str) -> Result<Self> {
        let decoded = hex::decode(key)?;
        let bytes: [u8; KEY_SIZE] = decoded.try_into().map_err(|v: Vec<u8>| CryptoError::KeyLength {
            expected: KEY_SIZE,
            actual: v.len(),
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Decode a file key as stored inside file metadata.
    ///
    /// A 32-character string is a raw v1/v2 key (its ASCII bytes ARE the
    /// key); a 64-character string is a hex-encoded v3 key.
    pub fn from_unknown_string(key: &str) -> Result<Self> {
        match key.len() {
            32 => {
                let bytes: [u8; KEY_SIZE] = key.as_bytes().try_into().expect("checked length");
                Ok(Self::from_bytes(bytes))
            }
            64 => Self::from_hex(key),
            other => Err(CryptoError::KeyLength {
                expected: KEY_SIZE,
                actual: other,
            }),
        }
    }

    /// Generate a fresh random v3 key.
    pub fn generate() -> Self {
        Self::from_bytes(random_bytes())
    }

    /// Generate a fresh v1/v2 file key: the ASCII bytes of a random
    /// 32-character alphanumeric string.
    pub fn generate_alnum() -> Self {
        let key = random_alnum_string(KEY_SIZE);
        let bytes: [u8; KEY_SIZE] = key.as_bytes().try_into().expect("alnum string is 32 bytes");
        Self::from_bytes(bytes)
    }

    pub fn bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Serialize for embedding in file metadata: hex for v3, raw ASCII for
    /// v1/v2 (where the key is alphanumeric by construction).
    pub fn to_stored_string(&self, auth_version: u32) -> String {
        if auth_version == 3 {
            self.to_hex()
        } else {
            String::from_utf8_lossy(&self.bytes).into_owned()
        }
    }

    /// Encrypt metadata into a v3 envelope (hex nonce).
    pub fn encrypt_meta(&self, metadata: &str) -> Result<EncryptedString> {
        let nonce: [u8; NONCE_SIZE] = random_bytes();
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), metadata.as_bytes())
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        Ok(EncryptedString::new_v3(&sealed, &nonce))
    }

    /// Decrypt a v3 envelope.
    pub fn decrypt_meta(&self, metadata: &EncryptedString) -> Result<String> {
        if metadata.version()? != EnvelopeVersion::V3 {
            return Err(CryptoError::UnknownEnvelopeVersion);
        }
        let (nonce, sealed) = metadata.parse_v3()?;
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), sealed.as_ref())
            .map_err(|_| CryptoError::AuthTag)?;
        Ok(String::from_utf8(plaintext)?)
    }

    /// Seal a data chunk: `nonce ‖ ciphertext ‖ tag`.
    pub fn encrypt_data(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce: [u8; NONCE_SIZE] = random_bytes();
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Open a data chunk sealed by [`Self::encrypt_data`].
    pub fn decrypt_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < NONCE_SIZE {
            return Err(CryptoError::MalformedEnvelope("chunk shorter than nonce".into()));
        }
        let (nonce, sealed) = data.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::AuthTag)
    }
}

impl PartialEq for EncryptionKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for EncryptionKey {}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}
