//! The account RSA keypair
//!
//! The server stores the private key PKCS#8-encoded inside a metadata
//! envelope and the public key as plain base64 SubjectPublicKeyInfo. For
//! local session persistence the private key round-trips through PKCS#1
//! DER.

use crate::{error::Result, CryptoError};
use base64::Engine;
use rsa::{
    pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey},
    pkcs8::{DecodePrivateKey, DecodePublicKey},
    RsaPrivateKey, RsaPublicKey,
};

const B64: base64::engine::general_purpose::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// The account keypair, verified consistent at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct AccountKeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl AccountKeyPair {
    /// Parse the decrypted private key (base64 PKCS#8) and the server's
    /// public key (base64 SPKI), verifying they belong together.
    pub fn from_strings(private_b64: &str, public_b64: &str) -> Result<Self> {
        let private_der = B64.decode(private_b64)?;
        let public_der = B64.decode(public_b64)?;

        let private = RsaPrivateKey::from_pkcs8_der(&private_der)
            .map_err(|e| CryptoError::Rsa(format!("parsing private key: {e}")))?;
        let public = RsaPublicKey::from_public_key_der(&public_der)
            .map_err(|e| CryptoError::Rsa(format!("parsing public key: {e}")))?;

        if private.to_public_key() != public {
            return Err(CryptoError::KeyPairMismatch);
        }
        Ok(Self { private, public })
    }

    /// Rebuild the pair from a persisted PKCS#1 private key; the public
    /// half is recovered from it.
    pub fn from_pkcs1_der(der: &[u8]) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs1_der(der)
            .map_err(|e| CryptoError::Rsa(format!("parsing private key: {e}")))?;
        let public = private.to_public_key();
        Ok(Self { private, public })
    }

    /// Serialize the private key as PKCS#1 DER for session persistence.
    pub fn to_pkcs1_der(&self) -> Result<Vec<u8>> {
        Ok(self
            .private
            .to_pkcs1_der()
            .map_err(|e| CryptoError::Rsa(format!("encoding private key: {e}")))?
            .as_bytes()
            .to_vec())
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }
}
