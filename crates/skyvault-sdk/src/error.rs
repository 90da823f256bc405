//! SDK error types

use skyvault_client::cancel::{Cancel, CancelCause};
use skyvault_client::{ApiError, ClientError, TransportError};
use skyvault_crypto::CryptoError;
use thiserror::Error;

/// Result type alias using the SDK `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by SDK operations
#[derive(Error, Debug)]
pub enum Error {
    /// The HTTP machinery failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server rejected a well-formed request
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A cryptographic operation failed
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// JSON (de)serialization of decrypted metadata failed
    #[error("metadata json: {0}")]
    Json(#[from] serde_json::Error),

    /// Session persistence failed
    #[error("session serialization: {0}")]
    Serialization(#[from] bincode::Error),

    /// Local file I/O failed
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The server replied with data contradicting the request
    #[error("server inconsistency: {0}")]
    ServerInconsistency(String),

    /// A non-empty upload finished without a single successful chunk
    #[error("no chunks successfully uploaded")]
    NoChunksUploaded,

    /// A downloaded chunk exceeded the plaintext chunk size
    #[error("chunk {index} is too large: {size} bytes")]
    ChunkTooLarge { index: u64, size: usize },

    /// The streamed content hash did not match the file metadata
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    /// The response envelope carried no data
    #[error("no data in response")]
    NoData,

    /// The operation was cancelled because a task failed; `cause` is the
    /// original failure
    #[error("cancelled: {cause}")]
    Cancelled { cause: CancelCause },

    /// The operation was cancelled by the caller
    #[error("operation cancelled")]
    Aborted,
}

impl From<ClientError> for Error {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Transport(e) => Error::Transport(e),
            ClientError::Api(e) => Error::Api(e),
            ClientError::NoData => Error::NoData,
            ClientError::Cancelled => Error::Aborted,
        }
    }
}

/// The error to report after a cancellation: the recorded cause if a task
/// failure triggered it, a plain abort otherwise.
pub(crate) fn cancelled_error(ctx: &Cancel) -> Error {
    match ctx.cause() {
        Some(cause) => Error::Cancelled { cause },
        None => Error::Aborted,
    }
}
