//! URL pools and per-call endpoint resolution
//!
//! Three URL pools exist: gateway (JSON API), ingest (chunk upload), egest
//! (chunk download). A base URL is chosen uniformly at random per call and
//! then cached on the endpoint, so retries within one call hit the same
//! host and error messages name the URL that actually served the request.

use crate::config::Config;
use rand::Rng;

/// Which pool an endpoint routes through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UrlPool {
    Gateway,
    Ingest,
    Egest,
}

/// A single call's target: pool + path, with the chosen URL cached.
#[derive(Clone, Debug)]
pub struct Endpoint {
    pool: UrlPool,
    path: String,
    cached: Option<String>,
}

impl Endpoint {
    pub fn gateway(path: impl Into<String>) -> Self {
        Self { pool: UrlPool::Gateway, path: path.into(), cached: None }
    }

    pub fn ingest(path: impl Into<String>) -> Self {
        Self { pool: UrlPool::Ingest, path: path.into(), cached: None }
    }

    pub fn egest(path: impl Into<String>) -> Self {
        Self { pool: UrlPool::Egest, path: path.into(), cached: None }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Pick a base URL from the pool (first call only) and return the full
    /// URL for this call.
    pub fn resolve(&mut self, config: &Config) -> &str {
        if self.cached.is_none() {
            let pool = match self.pool {
                UrlPool::Gateway => &config.gateway_urls,
                UrlPool::Ingest => &config.ingest_urls,
                UrlPool::Egest => &config.egest_urls,
            };
            let base = &pool[rand::thread_rng().gen_range(0..pool.len())];
            self.cached = Some(format!("{}{}", base, self.path));
        }
        self.cached.as_deref().expect("cached above")
    }
}
