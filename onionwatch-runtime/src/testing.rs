//! Test doubles shared by the runtime tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use onionwatch_tor::{FetchOutcome, FetchedPage, Fetcher};

pub const ONION_A: &str = "dreadytofatroptsdj6io7l3xptbet6onoyno2yv7jicoxknyazubrad.onion";
pub const ONION_B: &str = "torlistbsvieqsqctmi5fv2dbfxg7p3x77po7fhdcwfcr3xv5shxmzad.onion";
pub const ONION_C: &str = "onionzwpil5nbukgflurrfvommx6aznkz7aaqh2gwm4qsxjj6yvihxid.onion";

pub fn url(token: &str) -> String {
    format!("http://{}", token)
}

pub fn page(status: u16, body: &str) -> FetchOutcome {
    FetchOutcome::Success(FetchedPage {
        status,
        body: body.to_string(),
        headers: [("content-type".to_string(), "text/html".to_string())]
            .into_iter()
            .collect(),
    })
}

/// Serves canned outcomes; unknown URLs fail like a refused connection
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: HashMap<String, FetchOutcome>,
    latency: Option<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, outcome: FetchOutcome) -> Self {
        self.pages.insert(url.to_string(), outcome);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        self.calls.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| FetchOutcome::failure("connection refused"))
    }
}
