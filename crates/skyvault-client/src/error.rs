//! Transport and API error types

use thiserror::Error;

/// Result type alias using `ClientError`
pub type Result<T> = std::result::Result<T, ClientError>;

/// A failure of the HTTP machinery itself. Each variant carries the method
/// and the concrete URL chosen for the call, so multi-pool diagnostics
/// point at the host that actually failed.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request could not be sent (connect, TLS, timeout, ...)
    #[error("{method} {url}: cannot send request ({source})")]
    Send {
        method: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The request could not be constructed
    #[error("{method} {url}: cannot build request ({reason})")]
    Build {
        method: &'static str,
        url: String,
        reason: String,
    },

    /// The response body could not be read
    #[error("{method} {url}: cannot read response body ({source})")]
    ReadBody {
        method: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body was not the expected JSON shape
    #[error("{method} {url}: cannot decode response ({detail})")]
    DecodeJson {
        method: &'static str,
        url: String,
        detail: String,
    },
}

/// The server rejected a well-formed request (`status: false` envelope).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("api error ({code}): {message}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

/// Errors surfaced by the transport layer.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// The response envelope carried no `data` field
    #[error("no data in response")]
    NoData,

    /// The call was aborted through its cancellation handle; the cause, if
    /// any, lives on the handle
    #[error("request cancelled")]
    Cancelled,
}
