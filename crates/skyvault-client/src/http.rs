//! The reqwest-backed production transport

use crate::{
    cancel::Cancel,
    config::Config,
    error::{ApiError, ClientError, TransportError},
    transport::{ApiResponse, Transport},
    urls::Endpoint,
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header;
use std::sync::RwLock;
use tracing::debug;

/// Gateway paths that are reachable before login and must not carry a
/// bearer token.
const UNAUTHORIZED_PATHS: &[&str] = &["/v3/auth/info", "/v3/login"];

/// Production [`Transport`] over HTTPS.
pub struct HttpTransport {
    config: Config,
    http: reqwest::Client,
    api_key: RwLock<Option<String>>,
}

impl HttpTransport {
    /// Build a transport with the given configuration.
    pub fn new(config: Config) -> Result<Self, ClientError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            config.user_agent.parse().map_err(|_| {
                ClientError::Transport(TransportError::Build {
                    method: "GET",
                    url: String::new(),
                    reason: "invalid user agent".to_string(),
                })
            })?,
        );

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| {
                ClientError::Transport(TransportError::Build {
                    method: "GET",
                    url: String::new(),
                    reason: e.to_string(),
                })
            })?;

        Ok(Self { config, http, api_key: RwLock::new(None) })
    }

    /// Build an already-authorized transport from a stored API key.
    pub fn with_api_key(config: Config, api_key: String) -> Result<Self, ClientError> {
        let transport = Self::new(config)?;
        transport.authorize(api_key);
        Ok(transport)
    }

    fn bearer_for(&self, path: &str) -> Option<String> {
        if UNAUTHORIZED_PATHS.contains(&path) {
            return None;
        }
        self.api_key.read().expect("api key lock").clone()
    }

    /// Send a request, racing it against cancellation.
    async fn send(
        &self,
        ctx: &Cancel,
        method: &'static str,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ClientError> {
        debug!(method, url, "sending request");
        tokio::select! {
            _ = ctx.cancelled() => Err(ClientError::Cancelled),
            result = request.send() => result.map_err(|e| {
                ClientError::Transport(TransportError::Send {
                    method,
                    url: url.to_string(),
                    source: e,
                })
            }),
        }
    }

    async fn read_body(
        &self,
        ctx: &Cancel,
        method: &'static str,
        url: &str,
        response: reqwest::Response,
    ) -> Result<Bytes, ClientError> {
        tokio::select! {
            _ = ctx.cancelled() => Err(ClientError::Cancelled),
            result = response.bytes() => result.map_err(|e| {
                ClientError::Transport(TransportError::ReadBody {
                    method,
                    url: url.to_string(),
                    source: e,
                })
            }),
        }
    }

    /// Run a JSON-envelope request against a resolved endpoint.
    async fn request_envelope(
        &self,
        ctx: &Cancel,
        method: &'static str,
        mut endpoint: Endpoint,
        body: Option<serde_json::Value>,
        raw_body: Option<Bytes>,
    ) -> Result<ApiResponse, ClientError> {
        let url = endpoint.resolve(&self.config).to_string();

        let mut request = match method {
            "GET" => self.http.get(&url),
            "POST" => self.http.post(&url),
            other => {
                return Err(ClientError::Transport(TransportError::Build {
                    method: other,
                    url,
                    reason: "unknown method".to_string(),
                }))
            }
        };
        if let Some(key) = self.bearer_for(endpoint.path()) {
            request = request.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }
        if let Some(json) = body {
            request = request.json(&json);
        }
        if let Some(bytes) = raw_body {
            request = request.body(bytes);
        }

        let response = self.send(ctx, method, &url, request).await?;
        let body = self.read_body(ctx, method, &url, response).await?;

        let envelope: ApiResponse = serde_json::from_slice(&body).map_err(|_| {
            ClientError::Transport(TransportError::DecodeJson {
                method,
                url: url.clone(),
                detail: String::from_utf8_lossy(&body).into_owned(),
            })
        })?;
        Ok(envelope.check()?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(
        &self,
        ctx: &Cancel,
        path: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse, ClientError> {
        self.request_envelope(ctx, "POST", Endpoint::gateway(path), Some(body), None)
            .await
    }

    async fn get_json(&self, ctx: &Cancel, path: &str) -> Result<ApiResponse, ClientError> {
        self.request_envelope(ctx, "GET", Endpoint::gateway(path), None, None)
            .await
    }

    async fn get_bytes(&self, ctx: &Cancel, path: &str) -> Result<Bytes, ClientError> {
        let mut endpoint = Endpoint::egest(path);
        let url = endpoint.resolve(&self.config).to_string();

        // egest GETs carry no authorization
        let response = self.send(ctx, "GET", &url, self.http.get(&url)).await?;
        let status = response.status();
        let body = self.read_body(ctx, "GET", &url, response).await?;
        if !status.is_success() {
            return Err(ClientError::Api(ApiError {
                code: format!("HTTP{}", status.as_u16()),
                message: String::from_utf8_lossy(&body[..body.len().min(256)]).into_owned(),
            }));
        }
        Ok(body)
    }

    async fn post_bytes(
        &self,
        ctx: &Cancel,
        path_and_query: &str,
        payload: Bytes,
    ) -> Result<ApiResponse, ClientError> {
        self.request_envelope(ctx, "POST", Endpoint::ingest(path_and_query), None, Some(payload))
            .await
    }

    fn authorize(&self, api_key: String) {
        *self.api_key.write().expect("api key lock") = Some(api_key);
    }

    fn api_key(&self) -> Option<String> {
        self.api_key.read().expect("api key lock").clone()
    }
}
