//! In-memory transport implementing the gateway/ingest/egest contract
//!
//! Enough of the server to drive the SDK end to end without a network:
//! account bootstrap (v2 and v3), directory listings, uploads with pending
//! chunk staging, chunk downloads, trash and metadata rewrites. Key
//! material is produced with the same crypto crate the SDK uses, so every
//! envelope the mock hands out decrypts with a real login.

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey};
use serde_json::{json, Value};
use sha2::{Digest, Sha512};
use skyvault_client::{ApiError, ApiResponse, Cancel, ClientError, Transport};
use skyvault_crypto::{derive_v2, derive_v3, EncryptedString, EncryptionKey, MasterKey};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

pub struct MockAccount {
    pub email: String,
    pub auth_version: u32,
    pub salt: String,
    pub auth_token: String,
    pub api_key: String,
    pub master_keys_env: EncryptedString,
    pub dek_env: EncryptedString,
    pub private_key_env: EncryptedString,
    pub public_key_b64: String,
    pub root_uuid: String,
}

struct DirRecord {
    name_env: EncryptedString,
    #[allow(dead_code)]
    name_hashed: String,
    parent: String,
    timestamp: i64,
    trashed: bool,
}

struct FileRecord {
    metadata_env: EncryptedString,
    #[allow(dead_code)]
    name_env: EncryptedString,
    #[allow(dead_code)]
    name_hashed: String,
    parent: String,
    size: u64,
    chunks: u64,
    rm: String,
    bucket: String,
    region: String,
    version: u32,
    timestamp: i64,
    trashed: bool,
}

struct PendingUpload {
    upload_key: String,
    parent: String,
    chunks: HashMap<u64, Vec<u8>>,
}

#[derive(Default)]
struct MockState {
    dirs: HashMap<String, DirRecord>,
    files: HashMap<String, FileRecord>,
    chunks: HashMap<(String, u64), Vec<u8>>,
    pending: HashMap<String, PendingUpload>,
    dir_create_calls: usize,
    chunk_uploads: usize,
}

pub struct MockTransport {
    pub account: MockAccount,
    state: Mutex<MockState>,
    installed_key: Mutex<Option<String>>,
    /// Notified once the first chunk of any upload lands
    pub first_chunk: Notify,
    /// Artificial per-chunk latency, for cancellation tests
    pub chunk_delay: Duration,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn rsa_keypair_material() -> (String, String) {
    // small modulus keeps account setup fast
    let private = rsa::RsaPrivateKey::new(&mut rand::rngs::OsRng, 1024).unwrap();
    let b64 = base64::engine::general_purpose::STANDARD;
    let private_b64 = b64.encode(private.to_pkcs8_der().unwrap().as_bytes());
    let public_b64 = b64.encode(private.to_public_key().to_public_key_der().unwrap().as_bytes());
    (private_b64, public_b64)
}

impl MockTransport {
    /// An account using the v2 master-key scheme.
    pub fn v2_account(email: &str, password: &str) -> Self {
        let salt = "mock-salt-v2".to_string();
        let (key_bytes, auth_token) = derive_v2(password, &salt);
        let master_key = MasterKey::new(key_bytes);
        let key_str = String::from_utf8_lossy(master_key.bytes()).into_owned();
        let master_keys_env = master_key.encrypt_meta(&key_str).unwrap();

        let (private_b64, public_key_b64) = rsa_keypair_material();
        let private_key_env = master_key.encrypt_meta(&private_b64).unwrap();

        Self::new(MockAccount {
            email: email.to_string(),
            auth_version: 2,
            salt,
            auth_token,
            api_key: "mock-api-key-v2".to_string(),
            master_keys_env,
            dek_env: EncryptedString::default(),
            private_key_env,
            public_key_b64,
            root_uuid: uuid_v4(),
        })
    }

    /// An account using the v3 KEK/DEK scheme.
    pub fn v3_account(email: &str, password: &str) -> Self {
        let salt = "mock-salt-v3".to_string();
        let (kek_bytes, auth_token) = derive_v3(password, &salt).unwrap();
        let kek = EncryptionKey::from_bytes(kek_bytes);
        let dek = EncryptionKey::generate();
        let dek_env = kek.encrypt_meta(&dek.to_hex()).unwrap();

        let (private_b64, public_key_b64) = rsa_keypair_material();
        let private_key_env = dek.encrypt_meta(&private_b64).unwrap();

        Self::new(MockAccount {
            email: email.to_string(),
            auth_version: 3,
            salt,
            auth_token,
            api_key: "mock-api-key-v3".to_string(),
            master_keys_env: EncryptedString::default(),
            dek_env,
            private_key_env,
            public_key_b64,
            root_uuid: uuid_v4(),
        })
    }

    fn new(account: MockAccount) -> Self {
        Self {
            account,
            state: Mutex::new(MockState::default()),
            installed_key: Mutex::new(None),
            first_chunk: Notify::new(),
            chunk_delay: Duration::ZERO,
        }
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn dir_create_calls(&self) -> usize {
        self.state.lock().unwrap().dir_create_calls
    }

    pub fn chunk_uploads(&self) -> usize {
        self.state.lock().unwrap().chunk_uploads
    }

    /// Whether any non-trashed file exists under the given parent.
    pub fn has_file_under(&self, parent: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .files
            .values()
            .any(|f| f.parent == parent && !f.trashed)
    }

    fn check_auth(&self) -> Result<(), ClientError> {
        let installed = self.installed_key.lock().unwrap().clone();
        if installed.as_deref() == Some(self.account.api_key.as_str()) {
            Ok(())
        } else {
            Err(api_error("unauthorized", "API key missing or invalid"))
        }
    }

    fn handle_post(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        match path {
            "/v3/auth/info" => {
                if body["email"] != json!(self.account.email) {
                    return Err(api_error("email_not_found", "Unknown account"));
                }
                Ok(json!({ "authVersion": self.account.auth_version, "salt": self.account.salt.clone() }))
            }
            "/v3/login" => {
                if body["password"] != json!(self.account.auth_token)
                    || body["authVersion"] != json!(self.account.auth_version)
                {
                    return Err(api_error("invalid_credentials", "Wrong email or password"));
                }
                Ok(json!({
                    "apiKey": self.account.api_key.clone(),
                    "masterKeys": self.account.master_keys_env.clone(),
                    "publicKey": self.account.public_key_b64.clone(),
                    "privateKey": self.account.private_key_env.clone(),
                    "dek": self.account.dek_env.clone(),
                }))
            }
            "/v3/user/masterKeys" => {
                self.check_auth()?;
                Ok(json!({ "keys": self.account.master_keys_env.clone() }))
            }
            "/v3/dir/content" => {
                self.check_auth()?;
                let uuid = str_field(&body, "uuid")?;
                let state = self.state.lock().unwrap();
                let folders: Vec<Value> = state
                    .dirs
                    .iter()
                    .filter(|(_, d)| d.parent == uuid && !d.trashed)
                    .map(|(id, d)| {
                        json!({
                            "uuid": id,
                            "name": d.name_env.clone(),
                            "parent": d.parent.clone(),
                            "color": null,
                            "timestamp": d.timestamp,
                            "favorited": 0,
                            "is_sync": 0,
                            "is_default": 0,
                        })
                    })
                    .collect();
                let uploads: Vec<Value> = state
                    .files
                    .iter()
                    .filter(|(_, f)| f.parent == uuid && !f.trashed)
                    .map(|(id, f)| {
                        json!({
                            "uuid": id,
                            "metadata": f.metadata_env.clone(),
                            "rm": f.rm.clone(),
                            "timestamp": f.timestamp,
                            "chunks": f.chunks,
                            "size": f.size,
                            "bucket": f.bucket.clone(),
                            "region": f.region.clone(),
                            "parent": f.parent.clone(),
                            "version": f.version,
                            "favorited": 0,
                        })
                    })
                    .collect();
                Ok(json!({ "uploads": uploads, "folders": folders }))
            }
            "/v3/dir/create" => {
                self.check_auth()?;
                let uuid = str_field(&body, "uuid")?;
                let mut state = self.state.lock().unwrap();
                state.dir_create_calls += 1;
                state.dirs.insert(
                    uuid.clone(),
                    DirRecord {
                        name_env: EncryptedString::from_wire(str_field(&body, "name")?),
                        name_hashed: str_field(&body, "nameHashed")?,
                        parent: str_field(&body, "parent")?,
                        timestamp: now_ms(),
                        trashed: false,
                    },
                );
                Ok(json!({ "uuid": uuid }))
            }
            "/v3/dir/trash" => {
                self.check_auth()?;
                let uuid = str_field(&body, "uuid")?;
                let mut state = self.state.lock().unwrap();
                match state.dirs.get_mut(&uuid) {
                    Some(dir) => {
                        dir.trashed = true;
                        Ok(Value::Null)
                    }
                    None => Err(api_error("dir_not_found", "No such directory")),
                }
            }
            "/v3/file/trash" => {
                self.check_auth()?;
                let uuid = str_field(&body, "uuid")?;
                let mut state = self.state.lock().unwrap();
                match state.files.get_mut(&uuid) {
                    Some(file) => {
                        file.trashed = true;
                        Ok(Value::Null)
                    }
                    None => Err(api_error("file_not_found", "No such file")),
                }
            }
            "/v3/dir/delete/permanent" => {
                self.check_auth()?;
                let uuid = str_field(&body, "uuid")?;
                self.state.lock().unwrap().dirs.remove(&uuid);
                Ok(Value::Null)
            }
            "/v3/file/delete/permanent" => {
                self.check_auth()?;
                let uuid = str_field(&body, "uuid")?;
                let mut state = self.state.lock().unwrap();
                state.files.remove(&uuid);
                state.chunks.retain(|(id, _), _| *id != uuid);
                Ok(Value::Null)
            }
            "/v3/file/metadata" => {
                self.check_auth()?;
                let uuid = str_field(&body, "uuid")?;
                let mut state = self.state.lock().unwrap();
                match state.files.get_mut(&uuid) {
                    Some(file) => {
                        file.metadata_env = EncryptedString::from_wire(str_field(&body, "metadata")?);
                        file.name_env = EncryptedString::from_wire(str_field(&body, "name")?);
                        file.name_hashed = str_field(&body, "nameHashed")?;
                        Ok(Value::Null)
                    }
                    None => Err(api_error("file_not_found", "No such file")),
                }
            }
            "/v3/upload/done" => {
                self.check_auth()?;
                let uuid = str_field(&body, "uuid")?;
                let upload_key = str_field(&body, "uploadKey")?;
                let size: u64 = str_field(&body, "size")?
                    .parse()
                    .map_err(|_| api_error("invalid_params", "Bad size"))?;
                let chunks = body["chunks"].as_u64().unwrap_or(0);

                let mut state = self.state.lock().unwrap();
                let pending = state
                    .pending
                    .remove(&uuid)
                    .ok_or_else(|| api_error("upload_not_found", "No pending upload"))?;
                if pending.upload_key != upload_key {
                    return Err(api_error("invalid_params", "Invalid upload key."));
                }
                let parent = pending.parent.clone();
                for (index, data) in pending.chunks {
                    state.chunks.insert((uuid.clone(), index), data);
                }
                state.files.insert(
                    uuid,
                    FileRecord {
                        metadata_env: EncryptedString::from_wire(str_field(&body, "metadata")?),
                        name_env: EncryptedString::from_wire(str_field(&body, "name")?),
                        name_hashed: str_field(&body, "nameHashed")?,
                        parent,
                        size,
                        chunks,
                        rm: str_field(&body, "rm")?,
                        bucket: "mock-bucket".to_string(),
                        region: "mock-region".to_string(),
                        version: body["version"].as_u64().unwrap_or(0) as u32,
                        timestamp: now_ms(),
                        trashed: false,
                    },
                );
                Ok(json!({ "chunks": chunks, "size": size }))
            }
            "/v3/upload/empty" => {
                self.check_auth()?;
                let uuid = str_field(&body, "uuid")?;
                let mut state = self.state.lock().unwrap();
                state.files.insert(
                    uuid,
                    FileRecord {
                        metadata_env: EncryptedString::from_wire(str_field(&body, "metadata")?),
                        name_env: EncryptedString::from_wire(str_field(&body, "name")?),
                        name_hashed: str_field(&body, "nameHashed")?,
                        parent: str_field(&body, "parent")?,
                        size: 0,
                        chunks: 0,
                        rm: String::new(),
                        bucket: String::new(),
                        region: String::new(),
                        version: body["version"].as_u64().unwrap_or(0) as u32,
                        timestamp: now_ms(),
                        trashed: false,
                    },
                );
                Ok(json!({ "chunks": 0, "size": 0 }))
            }
            other => Err(api_error("not_found", &format!("Unknown endpoint {other}"))),
        }
    }

    fn handle_get(&self, path: &str) -> Result<Value, ClientError> {
        self.check_auth()?;
        match path {
            "/v3/user/dek" => Ok(json!({ "dek": self.account.dek_env.clone() })),
            "/v3/user/keyPair/info" => Ok(json!({
                "privateKey": self.account.private_key_env.clone(),
                "publicKey": self.account.public_key_b64.clone(),
            })),
            "/v3/user/baseFolder" => Ok(json!({ "uuid": self.account.root_uuid.clone() })),
            other => Err(api_error("not_found", &format!("Unknown endpoint {other}"))),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post_json(
        &self,
        ctx: &Cancel,
        path: &str,
        body: Value,
    ) -> Result<ApiResponse, ClientError> {
        if ctx.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        let data = self.handle_post(path, body)?;
        Ok(ok_response(data))
    }

    async fn get_json(&self, ctx: &Cancel, path: &str) -> Result<ApiResponse, ClientError> {
        if ctx.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        let data = self.handle_get(path)?;
        Ok(ok_response(data))
    }

    async fn get_bytes(&self, ctx: &Cancel, path: &str) -> Result<Bytes, ClientError> {
        if ctx.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        // /{region}/{bucket}/{uuid}/{index}
        let parts: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        if parts.len() != 4 {
            return Err(api_error("HTTP404", "Malformed chunk path"));
        }
        let uuid = parts[2].to_string();
        let index: u64 = parts[3].parse().map_err(|_| api_error("HTTP404", "Bad index"))?;
        let state = self.state.lock().unwrap();
        state
            .chunks
            .get(&(uuid, index))
            .map(|data| Bytes::from(data.clone()))
            .ok_or_else(|| api_error("HTTP404", "No such chunk"))
    }

    async fn post_bytes(
        &self,
        ctx: &Cancel,
        path_and_query: &str,
        payload: Bytes,
    ) -> Result<ApiResponse, ClientError> {
        self.check_auth()?;
        if !self.chunk_delay.is_zero() {
            tokio::select! {
                _ = ctx.cancelled() => return Err(ClientError::Cancelled),
                _ = tokio::time::sleep(self.chunk_delay) => {}
            }
        }
        if ctx.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let query = parse_query(path_and_query)?;
        let uuid = query_field(&query, "uuid")?;
        let index: u64 = query_field(&query, "index")?
            .parse()
            .map_err(|_| api_error("invalid_params", "Bad index"))?;
        let parent = query_field(&query, "parent")?;
        let upload_key = query_field(&query, "uploadKey")?;
        let hash = query_field(&query, "hash")?;
        if hash != hex::encode(Sha512::digest(&payload)) {
            return Err(api_error("invalid_params", "Chunk hash mismatch"));
        }

        {
            let mut state = self.state.lock().unwrap();
            state.chunk_uploads += 1;
            let pending = state.pending.entry(uuid).or_insert_with(|| PendingUpload {
                upload_key: upload_key.clone(),
                parent,
                chunks: HashMap::new(),
            });
            if pending.upload_key != upload_key {
                return Err(api_error("invalid_params", "Invalid upload key."));
            }
            pending.chunks.insert(index, payload.to_vec());
        }
        self.first_chunk.notify_one();

        Ok(ok_response(json!({ "bucket": "mock-bucket", "region": "mock-region" })))
    }

    fn authorize(&self, api_key: String) {
        *self.installed_key.lock().unwrap() = Some(api_key);
    }

    fn api_key(&self) -> Option<String> {
        self.installed_key.lock().unwrap().clone()
    }
}

fn ok_response(data: Value) -> ApiResponse {
    ApiResponse {
        status: true,
        message: String::new(),
        code: "ok".to_string(),
        data: if data.is_null() { None } else { Some(data) },
    }
}

fn api_error(code: &str, message: &str) -> ClientError {
    ClientError::Api(ApiError { code: code.to_string(), message: message.to_string() })
}

fn str_field(body: &Value, field: &str) -> Result<String, ClientError> {
    body[field]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| api_error("invalid_params", &format!("Missing field {field}")))
}

fn parse_query(path_and_query: &str) -> Result<HashMap<String, String>, ClientError> {
    let query = path_and_query
        .split_once('?')
        .map(|(_, q)| q)
        .ok_or_else(|| api_error("invalid_params", "Missing query"))?;
    Ok(query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect())
}

fn query_field(query: &HashMap<String, String>, field: &str) -> Result<String, ClientError> {
    query
        .get(field)
        .cloned()
        .ok_or_else(|| api_error("invalid_params", &format!("Missing query field {field}")))
}

fn uuid_v4() -> String {
    // derive a uuid-shaped id from random bytes; the SDK treats it as opaque
    let bytes: [u8; 16] = rand::random();
    format!(
        "{}-{}-{}-{}-{}",
        hex::encode(&bytes[0..4]),
        hex::encode(&bytes[4..6]),
        hex::encode(&bytes[6..8]),
        hex::encode(&bytes[8..10]),
        hex::encode(&bytes[10..16]),
    )
}
