//! The v1/v2 master key and master key chain
//!
//! A master key is 64 raw bytes (the ASCII of a hex string in practice).
//! Its working key is derived with a single PBKDF2-SHA512 round, keyed and
//! salted with the key itself; that 32-byte value drives an AES-256-GCM
//! cipher for v2 envelopes and the EVP schedule for legacy v1 envelopes.
//!
//! When the user changes their password a new master key is prepended to
//! the chain: index 0 always encrypts, every member is tried for
//! decryption.

use crate::{
    envelope::{EncryptedString, EnvelopeVersion},
    error::Result,
    kdf::evp_bytes_to_key_md5,
    random::random_alnum_string,
    CryptoError, KEY_SIZE, MASTER_KEY_SIZE, NONCE_SIZE,
};
use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit, Nonce};
use sha2::Sha512;
use zeroize::Zeroize;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// A single 64-byte master key with its derived AEAD state.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; MASTER_KEY_SIZE],
    derived: [u8; KEY_SIZE],
    cipher: Aes256Gcm,
}

impl MasterKey {
    /// Build a master key from its 64 raw bytes.
    pub fn new(bytes: [u8; MASTER_KEY_SIZE]) -> Self {
        let mut derived = [0u8; KEY_SIZE];
        pbkdf2::pbkdf2_hmac::<Sha512>(&bytes, &bytes, 1, &mut derived);
        let cipher = Aes256Gcm::new_from_slice(&derived).expect("derived key is 32 bytes");
        Self { bytes, derived, cipher }
    }

    /// Build a master key from a 64-character string segment.
    pub fn from_str_key(key: &str) -> Result<Self> {
        let bytes: [u8; MASTER_KEY_SIZE] =
            key.as_bytes()
                .try_into()
                .map_err(|_| CryptoError::KeyLength {
                    expected: MASTER_KEY_SIZE,
                    actual: key.len(),
                })?;
        Ok(Self::new(bytes))
    }

    /// The raw 64 key bytes.
    pub fn bytes(&self) -> &[u8; MASTER_KEY_SIZE] {
        &self.bytes
    }

    /// The 32 derived bytes actually keying the cipher.
    pub fn derived_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.derived
    }

    /// Encrypt metadata into a v2 envelope.
    ///
    /// The nonce is the ASCII of a fresh random alphanumeric string, not
    /// arbitrary bytes; the envelope embeds it verbatim.
    pub fn encrypt_meta(&self, metadata: &str) -> Result<EncryptedString> {
        let nonce_str = random_alnum_string(NONCE_SIZE);
        let nonce: [u8; NONCE_SIZE] = nonce_str.as_bytes().try_into().expect("nonce is 12 bytes");
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), metadata.as_bytes())
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        Ok(EncryptedString::new_v2(&sealed, &nonce))
    }

    /// Decrypt a v1 or v2 envelope, dispatching on the prefix.
    pub fn decrypt_meta(&self, metadata: &EncryptedString) -> Result<String> {
        match metadata.version()? {
            EnvelopeVersion::V1 => self.decrypt_meta_v1(metadata),
            EnvelopeVersion::V2 => self.decrypt_meta_v2(metadata),
            EnvelopeVersion::V3 => Err(CryptoError::UnknownEnvelopeVersion),
        }
    }

    /// Decrypt a legacy Salted-OpenSSL v1 envelope.
    ///
    /// The EVP password input is the 64 ASCII hex characters of the derived
    /// bytes, not the raw bytes.
    pub fn decrypt_meta_v1(&self, metadata: &EncryptedString) -> Result<String> {
        let (salt, ciphertext) = metadata.parse_v1()?;
        if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
            return Err(CryptoError::MalformedEnvelope(
                "v1 ciphertext is not block-aligned".into(),
            ));
        }

        let derived_hex = hex::encode(self.derived);
        let (key, iv) = evp_bytes_to_key_md5(derived_hex.as_bytes(), &salt, 32, 16);

        let mut buf = ciphertext;
        let plaintext = Aes256CbcDec::new_from_slices(&key, &iv)
            .map_err(|_| CryptoError::KeyLength {
                expected: 32,
                actual: key.len(),
            })?
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|_| CryptoError::PaddingInvalid)?;

        let padding = *plaintext.last().ok_or(CryptoError::PaddingInvalid)? as usize;
        if padding == 0 || padding > 16 || padding > plaintext.len() {
            return Err(CryptoError::PaddingInvalid);
        }
        Ok(String::from_utf8(plaintext[..plaintext.len() - padding].to_vec())?)
    }

    /// Decrypt a v2 envelope.
    pub fn decrypt_meta_v2(&self, metadata: &EncryptedString) -> Result<String> {
        let (nonce, sealed) = metadata.parse_v2()?;
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), sealed.as_ref())
            .map_err(|_| CryptoError::AuthTag)?;
        Ok(String::from_utf8(plaintext)?)
    }
}

impl PartialEq for MasterKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for MasterKey {}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never log key material
        f.write_str("MasterKey(..)")
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
        self.derived.zeroize();
    }
}

/// The ordered master key chain: index 0 encrypts, all members decrypt.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct MasterKeyChain {
    keys: Vec<MasterKey>,
}

impl MasterKeyChain {
    /// An empty chain, used by v3 sessions that carry no master keys.
    pub fn empty() -> Self {
        Self { keys: Vec::new() }
    }

    /// Rebuild a chain from stored 64-byte keys, preserving order.
    pub fn from_keys(keys: Vec<MasterKey>) -> Self {
        Self { keys }
    }

    /// Parse the server's pipe-separated key list and prepend the login
    /// key, dropping any listed duplicate of it.
    pub fn from_joined(current: MasterKey, joined: &str) -> Result<Self> {
        let mut keys = Vec::new();
        for segment in joined.split('|') {
            let key = MasterKey::from_str_key(segment)?;
            if key.derived == current.derived {
                continue;
            }
            keys.push(key);
        }
        keys.insert(0, current);
        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[MasterKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Encrypt metadata with the current (first) key.
    pub fn encrypt_meta(&self, metadata: &str) -> Result<EncryptedString> {
        self.keys
            .first()
            .ok_or(CryptoError::EmptyKeyChain)?
            .encrypt_meta(metadata)
    }

    /// Try every key in order; surface all failures if none works.
    pub fn decrypt_meta(&self, metadata: &EncryptedString) -> Result<String> {
        let mut errors = Vec::new();
        for key in &self.keys {
            match key.decrypt_meta(metadata) {
                Ok(plaintext) => return Ok(plaintext),
                Err(e) => errors.push(e),
            }
        }
        Err(CryptoError::AllKeysFailed(errors))
    }
}
