//! Page fetching over Tor
//!
//! A fetch never returns an error to the caller. Network, proxy, timeout,
//! TLS and body-read problems all collapse into `FetchOutcome::Failure`,
//! whose reason is only meant for logs.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::{create_tor_client, TorConfig, TorError};

/// A response that made it back through the proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
    pub headers: BTreeMap<String, String>,
}

/// Result of fetching one address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(FetchedPage),
    Failure { reason: String },
}

impl FetchOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        FetchOutcome::Failure {
            reason: reason.into(),
        }
    }
}

/// Anything that can fetch a page by URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

/// Fetcher routing every request through the Tor SOCKS proxy
pub struct TorFetcher {
    client: Client,
}

impl TorFetcher {
    pub fn new(config: &TorConfig) -> Result<Self, TorError> {
        Ok(Self {
            client: create_tor_client(config)?,
        })
    }

    async fn try_fetch(&self, url: &str) -> Result<FetchedPage, TorError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let headers = header_map(response.headers());
        let body = response.text().await?;

        Ok(FetchedPage {
            status,
            body,
            headers,
        })
    }
}

#[async_trait]
impl Fetcher for TorFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        debug!("Fetching: {}", url);

        match self.try_fetch(url).await {
            Ok(page) => FetchOutcome::Success(page),
            Err(e) => {
                warn!("[FAILED] {} - {}", url, e);
                FetchOutcome::failure(e.to_string())
            }
        }
    }
}

/// Flatten response headers; repeated names join with ", "
pub fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();

    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        map.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, CONTENT_TYPE, SET_COOKIE};

    #[test]
    fn test_header_map_joins_repeats() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2"));

        let map = header_map(&headers);
        assert_eq!(map["content-type"], "text/html");
        assert_eq!(map["set-cookie"], "a=1, b=2");
    }

    #[tokio::test]
    async fn test_unreachable_proxy_is_failure() {
        let config = TorConfig::default()
            .with_socks_addr("socks5h://127.0.0.1:1")
            .with_timeout(5);
        let fetcher = TorFetcher::new(&config).unwrap();

        let outcome = fetcher
            .fetch("http://dreadytofatroptsdj6io7l3xptbet6onoyno2yv7jicoxknyazubrad.onion/")
            .await;

        match outcome {
            FetchOutcome::Failure { reason } => assert!(!reason.is_empty()),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stalled_proxy_times_out_as_failure() {
        // Accepts the SOCKS connection and never answers the handshake
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hold = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = TorConfig::default()
            .with_socks_addr(&format!("socks5h://{}", addr))
            .with_timeout(1);
        let fetcher = TorFetcher::new(&config).unwrap();

        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            fetcher.fetch("http://dreadytofatroptsdj6io7l3xptbet6onoyno2yv7jicoxknyazubrad.onion/"),
        )
        .await
        .expect("client timeout should fire first");

        assert!(matches!(outcome, FetchOutcome::Failure { .. }));
        assert!(started.elapsed() >= std::time::Duration::from_secs(1));
        hold.abort();
    }
}
