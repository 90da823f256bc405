//! # SkyVault Client
//!
//! HTTP transport layer for the SkyVault storage SDK.
//!
//! The rest of the SDK talks to the service exclusively through the narrow
//! [`Transport`] trait: JSON calls to the gateway pool, raw chunk downloads
//! from the egest pool, and raw chunk uploads to the ingest pool.
//! [`HttpTransport`] is the production reqwest-backed implementation; tests
//! substitute an in-memory one.
//!
//! Every call takes a [`Cancel`] handle. Cancelling it aborts in-flight
//! requests promptly and remembers the first cause, so callers see the real
//! failure rather than a generic "cancelled".

pub mod api;
pub mod cancel;
pub mod config;
pub mod error;
pub mod http;
pub mod transport;
pub mod urls;

pub use cancel::Cancel;
pub use config::Config;
pub use error::{ApiError, ClientError, Result, TransportError};
pub use http::HttpTransport;
pub use transport::{ApiResponse, Transport};
pub use urls::{Endpoint, UrlPool};
