//! The transport contract consumed by the SDK core

use crate::error::{ApiError, ClientError, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::cancel::Cancel;

/// The standard gateway response envelope.
///
/// A reply with `status: false` is an [`ApiError`], not a transport error;
/// implementations surface it before the caller ever sees the envelope.
#[derive(Clone, Debug, Deserialize)]
pub struct ApiResponse {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    /// Turn a `status: false` envelope into the server's [`ApiError`].
    pub fn check(self) -> Result<Self, ApiError> {
        if self.status {
            Ok(self)
        } else {
            Err(ApiError { code: self.code, message: self.message })
        }
    }

    /// Decode the `data` payload into a typed response.
    pub fn into_data<T: DeserializeOwned>(self, path: &str) -> Result<T, ClientError> {
        let data = self.data.ok_or(ClientError::NoData)?;
        serde_json::from_value(data).map_err(|e| {
            ClientError::Transport(TransportError::DecodeJson {
                method: "POST",
                url: path.to_string(),
                detail: e.to_string(),
            })
        })
    }
}

/// The narrow HTTP gateway the SDK core consumes.
///
/// Gateway JSON calls, egest chunk reads and ingest chunk writes all route
/// through this trait; the production implementation is
/// [`crate::HttpTransport`], test harnesses provide in-memory ones.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a JSON body to a gateway path.
    async fn post_json(
        &self,
        ctx: &Cancel,
        path: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse, ClientError>;

    /// GET a gateway path.
    async fn get_json(&self, ctx: &Cancel, path: &str) -> Result<ApiResponse, ClientError>;

    /// GET raw chunk bytes from the egest pool. Never authorized.
    async fn get_bytes(&self, ctx: &Cancel, path: &str) -> Result<Bytes, ClientError>;

    /// POST raw chunk bytes to the ingest pool; `path_and_query` carries
    /// the upload parameters as a query string.
    async fn post_bytes(
        &self,
        ctx: &Cancel,
        path_and_query: &str,
        payload: Bytes,
    ) -> Result<ApiResponse, ClientError>;

    /// Install the bearer token carried by subsequent requests.
    fn authorize(&self, api_key: String);

    /// The currently installed bearer token.
    fn api_key(&self) -> Option<String>;
}
