//! Session persistence
//!
//! A serialized session is a self-describing bincode blob of everything
//! needed to restore a working [`Drive`] without re-deriving keys: API key,
//! auth version, raw key material, the PKCS#1 private key, and the base
//! folder UUID. Fields absent for a version (DEK in v2, master keys in v3)
//! are zero-filled and unused. Byte-for-byte stability across restarts on
//! the same version is guaranteed; cross-version schema evolution is not.

use crate::{
    error::{Error, Result},
    session::{CryptoIdentity, Drive, DriveInner},
    types::RootDirectory,
};
use serde::{Deserialize, Serialize};
use skyvault_client::{Config, HttpTransport, Transport};
use skyvault_crypto::{
    AccountKeyPair, EncryptionKey, MasterKey, MasterKeyChain, KEY_SIZE, MASTER_KEY_SIZE,
};
use std::sync::Arc;

#[derive(Serialize, Deserialize)]
struct SerializableSession {
    api_key: String,
    auth_version: u32,
    email: String,
    master_keys: Vec<Vec<u8>>,
    dek: Vec<u8>,
    kek: Vec<u8>,
    hmac_key: Vec<u8>,
    private_key: Vec<u8>,
    base_folder_uuid: String,
}

impl Drive {
    /// Serialize this session to a byte-deterministic blob.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let identity = &self.inner.identity;
        let (dek, kek, hmac_key) = match identity {
            CryptoIdentity::V3 { kek, dek, hmac_key } => {
                (dek.bytes().to_vec(), kek.bytes().to_vec(), hmac_key.to_vec())
            }
            _ => (vec![0u8; KEY_SIZE], vec![0u8; KEY_SIZE], vec![0u8; KEY_SIZE]),
        };

        let session = SerializableSession {
            api_key: self.api_key().unwrap_or_default(),
            auth_version: identity.auth_version(),
            email: self.inner.email.clone(),
            master_keys: identity
                .master_keys()
                .keys()
                .iter()
                .map(|k| k.bytes().to_vec())
                .collect(),
            dek,
            kek,
            hmac_key,
            private_key: self.inner.keypair.to_pkcs1_der()?,
            base_folder_uuid: self.inner.base_folder.uuid.clone(),
        };
        Ok(bincode::serialize(&session)?)
    }

    /// Restore a session over the production transport.
    pub fn deserialize(config: Config, bytes: &[u8]) -> Result<Self> {
        let session: SerializableSession = bincode::deserialize(bytes)?;
        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::with_api_key(config, session.api_key.clone())?);
        Self::restore(session, transport)
    }

    /// Restore a session over an externally supplied transport.
    pub fn deserialize_with_transport(
        transport: Arc<dyn Transport>,
        bytes: &[u8],
    ) -> Result<Self> {
        let session: SerializableSession = bincode::deserialize(bytes)?;
        transport.authorize(session.api_key.clone());
        Self::restore(session, transport)
    }

    fn restore(session: SerializableSession, transport: Arc<dyn Transport>) -> Result<Self> {
        let identity = match session.auth_version {
            1 | 2 => {
                let mut keys = Vec::with_capacity(session.master_keys.len());
                for blob in &session.master_keys {
                    let bytes: [u8; MASTER_KEY_SIZE] =
                        blob.as_slice().try_into().map_err(|_| {
                            skyvault_crypto::CryptoError::KeyLength {
                                expected: MASTER_KEY_SIZE,
                                actual: blob.len(),
                            }
                        })?;
                    keys.push(MasterKey::new(bytes));
                }
                let master_keys = MasterKeyChain::from_keys(keys);
                if session.auth_version == 1 {
                    CryptoIdentity::V1 { master_keys }
                } else {
                    CryptoIdentity::V2 { master_keys }
                }
            }
            3 => {
                let dek = EncryptionKey::from_bytes(key_array(&session.dek)?);
                let kek = EncryptionKey::from_bytes(key_array(&session.kek)?);
                let hmac_key = key_array(&session.hmac_key)?;
                CryptoIdentity::V3 { kek, dek, hmac_key }
            }
            other => {
                return Err(Error::ServerInconsistency(format!(
                    "persisted session has unsupported auth version {other}"
                )))
            }
        };

        let keypair = AccountKeyPair::from_pkcs1_der(&session.private_key)?;

        Ok(Self {
            inner: Arc::new(DriveInner {
                transport,
                email: session.email,
                identity,
                keypair,
                base_folder: RootDirectory { uuid: session.base_folder_uuid },
            }),
        })
    }
}

fn key_array(bytes: &[u8]) -> Result<[u8; KEY_SIZE]> {
    bytes.try_into().map_err(|_| {
        Error::Crypto(skyvault_crypto::CryptoError::KeyLength {
            expected: KEY_SIZE,
            actual: bytes.len(),
        })
    })
}
