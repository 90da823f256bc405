//! Authenticated sessions
//!
//! [`Drive`] is the SDK handle: a shared transport plus the account's
//! resolved cryptographic identity. It is cheap to clone and safe to share
//! across tasks.
//!
//! The identity is a tagged sum over auth versions; metadata encryption,
//! decryption and name hashing dispatch over it exhaustively. Envelope
//! decryption dispatches separately, on the ciphertext prefix: v1/v2
//! envelopes go through the master key chain, v3 envelopes through the DEK.

use crate::{
    error::{Error, Result},
    types::RootDirectory,
};
use skyvault_client::{api, Cancel, Config, HttpTransport, Transport};
use skyvault_crypto::{
    derive_name_hash_key, derive_v2, derive_v3, hash_name_v2, hash_name_v3, CryptoError,
    EncryptedString, EncryptionKey, EnvelopeVersion, MasterKey, MasterKeyChain, AccountKeyPair,
    KEY_SIZE,
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// The session's cryptographic identity, keyed by auth version.
#[derive(Clone, Debug)]
pub enum CryptoIdentity {
    /// Legacy accounts: decode-only
    V1 { master_keys: MasterKeyChain },
    /// Master-key chain accounts
    V2 { master_keys: MasterKeyChain },
    /// KEK/DEK accounts with dedicated name-hash key
    V3 {
        kek: EncryptionKey,
        dek: EncryptionKey,
        hmac_key: [u8; KEY_SIZE],
    },
}

impl CryptoIdentity {
    pub fn auth_version(&self) -> u32 {
        match self {
            CryptoIdentity::V1 { .. } => 1,
            CryptoIdentity::V2 { .. } => 2,
            CryptoIdentity::V3 { .. } => 3,
        }
    }

    /// Encrypt metadata with the session's current key.
    pub fn encrypt_meta(&self, metadata: &str) -> Result<EncryptedString> {
        match self {
            CryptoIdentity::V1 { .. } => Err(CryptoError::UnsupportedVersion(1).into()),
            CryptoIdentity::V2 { master_keys } => Ok(master_keys.encrypt_meta(metadata)?),
            CryptoIdentity::V3 { dek, .. } => Ok(dek.encrypt_meta(metadata)?),
        }
    }

    /// Decrypt a metadata envelope, dispatching on its version prefix.
    pub fn decrypt_meta(&self, metadata: &EncryptedString) -> Result<String> {
        match metadata.version()? {
            EnvelopeVersion::V1 | EnvelopeVersion::V2 => match self {
                CryptoIdentity::V1 { master_keys } | CryptoIdentity::V2 { master_keys } => {
                    Ok(master_keys.decrypt_meta(metadata)?)
                }
                CryptoIdentity::V3 { .. } => {
                    // v3 accounts carry no master keys
                    Err(CryptoError::AllKeysFailed(Vec::new()).into())
                }
            },
            EnvelopeVersion::V3 => match self {
                CryptoIdentity::V3 { dek, .. } => Ok(dek.decrypt_meta(metadata)?),
                _ => Err(CryptoError::UnsupportedVersion(3).into()),
            },
        }
    }

    /// Deterministic case-folded name hash for lookups.
    pub fn hash_name(&self, name: &str) -> String {
        match self {
            CryptoIdentity::V1 { .. } | CryptoIdentity::V2 { .. } => hash_name_v2(name),
            CryptoIdentity::V3 { hmac_key, .. } => hash_name_v3(hmac_key, name),
        }
    }

    /// The master key chain (empty for v3 sessions).
    pub fn master_keys(&self) -> MasterKeyChain {
        match self {
            CryptoIdentity::V1 { master_keys } | CryptoIdentity::V2 { master_keys } => {
                master_keys.clone()
            }
            CryptoIdentity::V3 { .. } => MasterKeyChain::empty(),
        }
    }
}

pub(crate) struct DriveInner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) email: String,
    pub(crate) identity: CryptoIdentity,
    pub(crate) keypair: AccountKeyPair,
    pub(crate) base_folder: RootDirectory,
}

/// An authenticated session with the cloud drive.
#[derive(Clone)]
pub struct Drive {
    pub(crate) inner: Arc<DriveInner>,
}

impl Drive {
    /// Log in with email and password over the production transport.
    #[instrument(skip(password))]
    pub async fn login(ctx: &Cancel, config: Config, email: &str, password: &str) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config)?);
        Self::login_with_transport(ctx, transport, email, password).await
    }

    /// Log in reusing a stored API key, skipping `/v3/login`.
    #[instrument(skip(password, api_key))]
    pub async fn login_with_api_key(
        ctx: &Cancel,
        config: Config,
        email: &str,
        password: &str,
        api_key: &str,
    ) -> Result<Self> {
        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::with_api_key(config, api_key.to_string())?);
        Self::login_over(ctx, transport, email, password, true).await
    }

    /// Log in over an externally supplied transport (tests, custom stacks).
    pub async fn login_with_transport(
        ctx: &Cancel,
        transport: Arc<dyn Transport>,
        email: &str,
        password: &str,
    ) -> Result<Self> {
        Self::login_over(ctx, transport, email, password, false).await
    }

    async fn login_over(
        ctx: &Cancel,
        transport: Arc<dyn Transport>,
        email: &str,
        password: &str,
        already_authorized: bool,
    ) -> Result<Self> {
        let auth_info = api::post_auth_info(transport.as_ref(), ctx, email).await?;
        debug!(auth_version = auth_info.auth_version, "resolved auth info");

        let identity = match auth_info.auth_version {
            2 => {
                let (key_bytes, auth_token) = derive_v2(password, &auth_info.salt);
                let master_key = MasterKey::new(key_bytes);
                if !already_authorized {
                    let login = api::post_login(transport.as_ref(), ctx, email, &auth_token, 2).await?;
                    transport.authorize(login.api_key);
                }
                let master_keys = fetch_master_keys(transport.as_ref(), ctx, master_key).await?;
                CryptoIdentity::V2 { master_keys }
            }
            3 => {
                let (kek_bytes, auth_token) = derive_v3(password, &auth_info.salt)?;
                let kek = EncryptionKey::from_bytes(kek_bytes);
                if !already_authorized {
                    let login = api::post_login(transport.as_ref(), ctx, email, &auth_token, 3).await?;
                    transport.authorize(login.api_key);
                }
                let dek = fetch_dek(transport.as_ref(), ctx, &kek).await?;
                let hmac_key = derive_name_hash_key(dek.bytes());
                CryptoIdentity::V3 { kek, dek, hmac_key }
            }
            other => {
                return Err(Error::ServerInconsistency(format!(
                    "unsupported auth version {other}"
                )))
            }
        };

        let keypair = fetch_keypair(transport.as_ref(), ctx, &identity).await?;
        let base_folder_uuid = api::get_user_base_folder(transport.as_ref(), ctx).await?;

        Ok(Self {
            inner: Arc::new(DriveInner {
                transport,
                email: email.to_string(),
                identity,
                keypair,
                base_folder: RootDirectory { uuid: base_folder_uuid },
            }),
        })
    }

    pub fn email(&self) -> &str {
        &self.inner.email
    }

    pub fn auth_version(&self) -> u32 {
        self.inner.identity.auth_version()
    }

    /// The root directory marker of this account's drive.
    pub fn root(&self) -> RootDirectory {
        self.inner.base_folder.clone()
    }

    /// The bearer token of this session, if any.
    pub fn api_key(&self) -> Option<String> {
        self.inner.transport.api_key()
    }

    pub fn identity(&self) -> &CryptoIdentity {
        &self.inner.identity
    }

    pub fn keypair(&self) -> &AccountKeyPair {
        &self.inner.keypair
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    /// Encrypt a metadata string with the session identity.
    pub fn encrypt_meta(&self, metadata: &str) -> Result<EncryptedString> {
        self.inner.identity.encrypt_meta(metadata)
    }

    /// Decrypt a metadata envelope with the session identity.
    pub fn decrypt_meta(&self, metadata: &EncryptedString) -> Result<String> {
        self.inner.identity.decrypt_meta(metadata)
    }

    /// Hash a file or directory name for server-side lookup.
    pub fn hash_name(&self, name: &str) -> String {
        self.inner.identity.hash_name(name)
    }
}

impl std::fmt::Debug for Drive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Drive")
            .field("email", &self.inner.email)
            .field("auth_version", &self.auth_version())
            .field("base_folder", &self.inner.base_folder.uuid)
            .finish()
    }
}

/// Fetch and assemble the v2 master key chain.
///
/// The request body proves key possession: the raw 64 key bytes, encrypted
/// under the key itself. The reply is the pipe-separated key list under the
/// same key; the login key ends up prepended as the current encryption key.
async fn fetch_master_keys(
    transport: &dyn Transport,
    ctx: &Cancel,
    master_key: MasterKey,
) -> Result<MasterKeyChain> {
    let key_str = String::from_utf8_lossy(master_key.bytes()).into_owned();
    let encrypted = master_key.encrypt_meta(&key_str)?;
    let response = api::post_user_master_keys(transport, ctx, &encrypted).await?;
    let joined = master_key.decrypt_meta_v2(&response.keys)?;
    Ok(MasterKeyChain::from_joined(master_key, &joined)?)
}

/// Fetch the v3 DEK and unwrap it with the KEK.
async fn fetch_dek(
    transport: &dyn Transport,
    ctx: &Cancel,
    kek: &EncryptionKey,
) -> Result<EncryptionKey> {
    let encrypted = api::get_user_dek(transport, ctx).await?;
    let dek_hex = kek.decrypt_meta(&encrypted)?;
    Ok(EncryptionKey::from_hex(&dek_hex)?)
}

/// Fetch the account RSA keypair and verify its halves belong together.
async fn fetch_keypair(
    transport: &dyn Transport,
    ctx: &Cancel,
    identity: &CryptoIdentity,
) -> Result<AccountKeyPair> {
    let response = api::get_user_key_pair_info(transport, ctx).await?;
    let private_b64 = identity.decrypt_meta(&response.private_key)?;
    Ok(AccountKeyPair::from_strings(&private_b64, &response.public_key)?)
}
