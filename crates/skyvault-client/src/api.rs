//! Typed wrappers for the v3 gateway endpoints
//!
//! One function per endpoint, mirroring the wire JSON field names. Every
//! wrapper takes the transport as a trait object so the SDK core stays
//! independent of the concrete HTTP stack.

use crate::{cancel::Cancel, error::Result, transport::Transport};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use skyvault_crypto::{hashing::sha512, EncryptedString};

// /v3/auth/info

#[derive(Debug, Clone, Deserialize)]
pub struct AuthInfoResponse {
    #[serde(rename = "authVersion")]
    pub auth_version: u32,
    pub salt: String,
}

pub async fn post_auth_info(
    transport: &dyn Transport,
    ctx: &Cancel,
    email: &str,
) -> Result<AuthInfoResponse> {
    let path = "/v3/auth/info";
    let response = transport.post_json(ctx, path, json!({ "email": email })).await?;
    response.into_data(path)
}

// /v3/login

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    #[serde(rename = "masterKeys", default)]
    pub master_keys: EncryptedString,
    #[serde(rename = "publicKey", default)]
    pub public_key: String,
    #[serde(rename = "privateKey", default)]
    pub private_key: EncryptedString,
    #[serde(default)]
    pub dek: EncryptedString,
}

pub async fn post_login(
    transport: &dyn Transport,
    ctx: &Cancel,
    email: &str,
    auth_token: &str,
    auth_version: u32,
) -> Result<LoginResponse> {
    let path = "/v3/login";
    let response = transport
        .post_json(
            ctx,
            path,
            json!({
                "email": email,
                "password": auth_token,
                "twoFactorCode": "XXXXXX",
                "authVersion": auth_version,
            }),
        )
        .await?;
    response.into_data(path)
}

// /v3/user/masterKeys

#[derive(Debug, Clone, Deserialize)]
pub struct UserMasterKeysResponse {
    pub keys: EncryptedString,
}

pub async fn post_user_master_keys(
    transport: &dyn Transport,
    ctx: &Cancel,
    encrypted_master_key: &EncryptedString,
) -> Result<UserMasterKeysResponse> {
    let path = "/v3/user/masterKeys";
    let response = transport
        .post_json(ctx, path, json!({ "masterKeys": encrypted_master_key }))
        .await?;
    response.into_data(path)
}

// /v3/user/dek

#[derive(Debug, Clone, Deserialize)]
struct UserDekResponse {
    dek: EncryptedString,
}

pub async fn get_user_dek(transport: &dyn Transport, ctx: &Cancel) -> Result<EncryptedString> {
    let path = "/v3/user/dek";
    let response = transport.get_json(ctx, path).await?;
    let data: UserDekResponse = response.into_data(path)?;
    Ok(data.dek)
}

// /v3/user/keyPair/info

#[derive(Debug, Clone, Deserialize)]
pub struct KeyPairInfoResponse {
    #[serde(rename = "privateKey")]
    pub private_key: EncryptedString,
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

pub async fn get_user_key_pair_info(
    transport: &dyn Transport,
    ctx: &Cancel,
) -> Result<KeyPairInfoResponse> {
    let path = "/v3/user/keyPair/info";
    let response = transport.get_json(ctx, path).await?;
    response.into_data(path)
}

// /v3/user/baseFolder

#[derive(Debug, Clone, Deserialize)]
struct UserBaseFolderResponse {
    uuid: String,
}

pub async fn get_user_base_folder(transport: &dyn Transport, ctx: &Cancel) -> Result<String> {
    let path = "/v3/user/baseFolder";
    let response = transport.get_json(ctx, path).await?;
    let data: UserBaseFolderResponse = response.into_data(path)?;
    Ok(data.uuid)
}

// /v3/dir/content

#[derive(Debug, Clone, Deserialize)]
pub struct DirContentResponse {
    #[serde(default)]
    pub uploads: Vec<DirContentUpload>,
    #[serde(default)]
    pub folders: Vec<DirContentFolder>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirContentUpload {
    pub uuid: String,
    pub metadata: EncryptedString,
    #[serde(default)]
    pub rm: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub chunks: u64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub region: String,
    pub parent: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub favorited: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirContentFolder {
    pub uuid: String,
    pub name: EncryptedString,
    pub parent: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub favorited: u8,
    #[serde(default)]
    pub is_sync: u8,
    #[serde(default)]
    pub is_default: u8,
}

pub async fn post_dir_content(
    transport: &dyn Transport,
    ctx: &Cancel,
    uuid: &str,
) -> Result<DirContentResponse> {
    let path = "/v3/dir/content";
    let response = transport.post_json(ctx, path, json!({ "uuid": uuid })).await?;
    response.into_data(path)
}

// /v3/dir/create

#[derive(Debug, Clone, Deserialize)]
struct DirCreateResponse {
    uuid: String,
}

pub async fn post_dir_create(
    transport: &dyn Transport,
    ctx: &Cancel,
    uuid: &str,
    name: &EncryptedString,
    name_hashed: &str,
    parent: &str,
) -> Result<String> {
    let path = "/v3/dir/create";
    let response = transport
        .post_json(
            ctx,
            path,
            json!({
                "uuid": uuid,
                "name": name,
                "nameHashed": name_hashed,
                "parent": parent,
            }),
        )
        .await?;
    let data: DirCreateResponse = response.into_data(path)?;
    Ok(data.uuid)
}

// trash & permanent delete

pub async fn post_file_trash(transport: &dyn Transport, ctx: &Cancel, uuid: &str) -> Result<()> {
    transport.post_json(ctx, "/v3/file/trash", json!({ "uuid": uuid })).await?;
    Ok(())
}

pub async fn post_dir_trash(transport: &dyn Transport, ctx: &Cancel, uuid: &str) -> Result<()> {
    transport.post_json(ctx, "/v3/dir/trash", json!({ "uuid": uuid })).await?;
    Ok(())
}

pub async fn post_file_delete_permanent(
    transport: &dyn Transport,
    ctx: &Cancel,
    uuid: &str,
) -> Result<()> {
    transport
        .post_json(ctx, "/v3/file/delete/permanent", json!({ "uuid": uuid }))
        .await?;
    Ok(())
}

pub async fn post_dir_delete_permanent(
    transport: &dyn Transport,
    ctx: &Cancel,
    uuid: &str,
) -> Result<()> {
    transport
        .post_json(ctx, "/v3/dir/delete/permanent", json!({ "uuid": uuid }))
        .await?;
    Ok(())
}

// /v3/file/metadata

pub async fn post_file_metadata(
    transport: &dyn Transport,
    ctx: &Cancel,
    uuid: &str,
    name: &EncryptedString,
    name_hashed: &str,
    metadata: &EncryptedString,
) -> Result<()> {
    transport
        .post_json(
            ctx,
            "/v3/file/metadata",
            json!({
                "uuid": uuid,
                "name": name,
                "nameHashed": name_hashed,
                "metadata": metadata,
            }),
        )
        .await?;
    Ok(())
}

// /v3/upload/done and /v3/upload/empty

#[derive(Debug, Clone, Serialize)]
pub struct UploadDoneRequest {
    pub uuid: String,
    pub name: EncryptedString,
    #[serde(rename = "nameHashed")]
    pub name_hashed: String,
    pub size: String,
    pub chunks: u64,
    pub mime: EncryptedString,
    pub rm: String,
    pub metadata: EncryptedString,
    pub version: u32,
    #[serde(rename = "uploadKey")]
    pub upload_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadEmptyRequest {
    pub uuid: String,
    pub name: EncryptedString,
    #[serde(rename = "nameHashed")]
    pub name_hashed: String,
    pub size: String,
    pub parent: String,
    pub mime: EncryptedString,
    pub metadata: EncryptedString,
    pub version: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadDoneResponse {
    #[serde(default)]
    pub chunks: u64,
    #[serde(default)]
    pub size: u64,
}

pub async fn post_upload_done(
    transport: &dyn Transport,
    ctx: &Cancel,
    request: &UploadDoneRequest,
) -> Result<UploadDoneResponse> {
    let path = "/v3/upload/done";
    let body = serde_json::to_value(request).expect("request serializes");
    let response = transport.post_json(ctx, path, body).await?;
    response.into_data(path)
}

pub async fn post_upload_empty(
    transport: &dyn Transport,
    ctx: &Cancel,
    request: &UploadEmptyRequest,
) -> Result<UploadDoneResponse> {
    let path = "/v3/upload/empty";
    let body = serde_json::to_value(request).expect("request serializes");
    let response = transport.post_json(ctx, path, body).await?;
    response.into_data(path)
}

// chunk I/O

#[derive(Debug, Clone, Deserialize)]
pub struct UploadChunkResponse {
    pub bucket: String,
    pub region: String,
}

/// Upload one encrypted chunk to the ingest pool.
///
/// The `hash` query parameter is the hex SHA-512 of the ciphertext, letting
/// the backend verify the body before accepting it.
pub async fn upload_chunk(
    transport: &dyn Transport,
    ctx: &Cancel,
    uuid: &str,
    index: u64,
    parent: &str,
    upload_key: &str,
    data: Bytes,
) -> Result<UploadChunkResponse> {
    let data_hash = hex::encode(sha512(&data));
    let path = format!(
        "/v3/upload?uuid={uuid}&index={index}&parent={parent}&uploadKey={upload_key}&hash={data_hash}"
    );
    let response = transport.post_bytes(ctx, &path, data).await?;
    response.into_data(&path)
}

/// Download one encrypted chunk from the egest pool.
pub async fn download_chunk(
    transport: &dyn Transport,
    ctx: &Cancel,
    region: &str,
    bucket: &str,
    uuid: &str,
    index: u64,
) -> Result<Bytes> {
    transport
        .get_bytes(ctx, &format!("/{region}/{bucket}/{uuid}/{index}"))
        .await
}
