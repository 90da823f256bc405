//! The metadata envelope wire format
//!
//! An [`EncryptedString`] is the self-describing ciphertext form a metadata
//! string takes on the wire:
//!
//! | Version | Layout |
//! |---|---|
//! | v1 | base64 of `"Salted__" ‖ salt(8) ‖ AES-256-CBC ciphertext` |
//! | v2 | `"002"` ‖ 12 ASCII nonce bytes ‖ base64(ciphertext ‖ tag) |
//! | v3 | `"003"` ‖ hex(12-byte nonce) ‖ base64(ciphertext ‖ tag) |
//!
//! The layouts are a bit-exact contract with the server and the other
//! client SDKs.

use crate::{error::Result, CryptoError, NONCE_SIZE};
use base64::Engine;
use serde::{Deserialize, Serialize};

const B64: base64::engine::general_purpose::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Marker prefix of a v1 envelope: base64 of `"Salted__"`.
const V1_PREFIX: &str = "U2FsdGVk";

/// The wire format a ciphertext envelope is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeVersion {
    V1,
    V2,
    V3,
}

/// An encrypted metadata string; opaque until decrypted with the right key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct EncryptedString(String);

impl EncryptedString {
    /// Wrap an already-encrypted wire string.
    pub fn from_wire(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Build a v2 envelope from sealed bytes and the ASCII nonce.
    pub fn new_v2(sealed: &[u8], nonce: &[u8; NONCE_SIZE]) -> Self {
        let mut out = String::with_capacity(3 + NONCE_SIZE + sealed.len() * 4 / 3 + 4);
        out.push_str("002");
        // v2 nonces are alphanumeric ASCII by construction
        out.push_str(std::str::from_utf8(nonce).expect("v2 nonce is ASCII"));
        out.push_str(&B64.encode(sealed));
        Self(out)
    }

    /// Build a v3 envelope from sealed bytes and the raw nonce.
    pub fn new_v3(sealed: &[u8], nonce: &[u8; NONCE_SIZE]) -> Self {
        Self(format!("003{}{}", hex::encode(nonce), B64.encode(sealed)))
    }

    /// Sniff the wire format from the envelope prefix.
    pub fn version(&self) -> Result<EnvelopeVersion> {
        if self.0.starts_with(V1_PREFIX) {
            Ok(EnvelopeVersion::V1)
        } else if self.0.starts_with("002") {
            Ok(EnvelopeVersion::V2)
        } else if self.0.starts_with("003") {
            Ok(EnvelopeVersion::V3)
        } else {
            Err(CryptoError::UnknownEnvelopeVersion)
        }
    }

    /// Split a v1 envelope into `(salt, ciphertext)`.
    pub fn parse_v1(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let decoded = B64.decode(&self.0)?;
        if decoded.len() < 16 {
            return Err(CryptoError::MalformedEnvelope("v1 envelope too short".into()));
        }
        Ok((decoded[8..16].to_vec(), decoded[16..].to_vec()))
    }

    /// Split a v2 envelope into `(nonce, ciphertext ‖ tag)`.
    pub fn parse_v2(&self) -> Result<([u8; NONCE_SIZE], Vec<u8>)> {
        if self.0.len() < 3 + NONCE_SIZE || !self.0.starts_with("002") {
            return Err(CryptoError::MalformedEnvelope("v2 envelope too short".into()));
        }
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&self.0.as_bytes()[3..3 + NONCE_SIZE]);
        let sealed = B64.decode(&self.0[3 + NONCE_SIZE..])?;
        Ok((nonce, sealed))
    }

    /// Split a v3 envelope into `(nonce, ciphertext ‖ tag)`.
    pub fn parse_v3(&self) -> Result<([u8; NONCE_SIZE], Vec<u8>)> {
        if self.0.len() < 3 + NONCE_SIZE * 2 || !self.0.starts_with("003") {
            return Err(CryptoError::MalformedEnvelope("v3 envelope too short".into()));
        }
        let nonce_bytes = hex::decode(&self.0[3..3 + NONCE_SIZE * 2])?;
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&nonce_bytes);
        let sealed = B64.decode(&self.0[3 + NONCE_SIZE * 2..])?;
        Ok((nonce, sealed))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for EncryptedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
