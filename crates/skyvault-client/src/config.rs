//! Transport configuration

use std::time::Duration;

/// Transport configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Gateway pool: JSON API calls
    pub gateway_urls: Vec<String>,
    /// Ingest pool: chunk uploads
    pub ingest_urls: Vec<String>,
    /// Egest pool: chunk downloads
    pub egest_urls: Vec<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_urls: vec!["https://gateway.skyvault.io".to_string()],
            ingest_urls: vec!["https://ingest.skyvault.io".to_string()],
            egest_urls: vec!["https://egest.skyvault.io".to_string()],
            timeout: Duration::from_secs(10),
            user_agent: format!("skyvault-sdk-rs/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
