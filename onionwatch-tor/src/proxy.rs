//! Tor SOCKS5h proxy client
//!
//! Creates HTTP clients that route through Tor for .onion access.

use reqwest::{redirect, Client, Proxy};
use std::time::Duration;
use thiserror::Error;

/// Identifying header sent with every request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; OnionScanner/1.0)";

/// Tor proxy configuration
#[derive(Debug, Clone)]
pub struct TorConfig {
    /// SOCKS5 proxy address (default: 127.0.0.1:9050)
    pub socks_addr: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User-Agent attached to every request
    pub user_agent: String,
    /// Redirect hops followed before giving up
    pub max_redirects: usize,
}

impl Default for TorConfig {
    fn default() -> Self {
        Self {
            socks_addr: "socks5h://127.0.0.1:9050".to_string(),
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_redirects: 10,
        }
    }
}

impl TorConfig {
    pub fn with_socks_addr(mut self, addr: &str) -> Self {
        self.socks_addr = addr.to_string();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Errors from Tor networking
#[derive(Debug, Error)]
pub enum TorError {
    #[error("Failed to build Tor client: {0}")]
    ClientBuild(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Create a Tor-enabled HTTP client
pub fn create_tor_client(config: &TorConfig) -> Result<Client, TorError> {
    let proxy = Proxy::all(&config.socks_addr)
        .map_err(|e| TorError::ClientBuild(e.to_string()))?;

    Client::builder()
        .proxy(proxy)
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.as_str())
        .redirect(redirect::Policy::limited(config.max_redirects))
        .danger_accept_invalid_certs(true) // Many .onion sites have self-signed certs
        .build()
        .map_err(|e| TorError::ClientBuild(e.to_string()))
}

/// Check if Tor proxy is reachable
pub async fn check_tor_connection(config: &TorConfig) -> Result<bool, TorError> {
    let client = create_tor_client(config)?;

    // Try to reach a known .onion address (Tor Project's)
    let result = client
        .get("http://2gzyxa5ihm7nsggfxnu52rck2vv4rvmdlkiu3ber7fzs2xqxczfebsid.onion/")
        .send()
        .await;

    match result {
        Ok(resp) => Ok(resp.status().is_success() || resp.status().is_redirection()),
        Err(_) => Ok(false),
    }
}
