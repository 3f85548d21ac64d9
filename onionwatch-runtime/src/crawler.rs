//! Crawl loop
//!
//! Pulls batches from the frontier, fetches them through the worker pool,
//! and for each address in turn: extracts, upserts into the store, writes
//! the sinks, then offers newly discovered addresses back to the frontier.
//! When the frontier runs dry the directory pages are harvested.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use onionwatch_core::{
    directory_pages, extract_onions, extract_page, format_timestamp, Address, ScanRecord,
    SinkRecord, SuccessRecord, DEFAULT_BATCH_DELAY_SECS, DEFAULT_CONCURRENCY, DEFAULT_IDLE_SECS,
};
use onionwatch_store::{OutcomeSinks, ScanStore, SinkRoute};
use onionwatch_tor::{FetchOutcome, Fetcher};

use crate::{Clock, CrawlError, Frontier, WorkerPool};

/// Crawl loop configuration
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Fetches in flight per batch
    pub concurrency: usize,
    /// Pause after every batch
    pub batch_delay: Duration,
    /// Pause when a harvest finds nothing new
    pub idle_interval: Duration,
    /// Pages harvested for new addresses when the frontier is empty
    pub directories: Vec<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            batch_delay: Duration::from_secs(DEFAULT_BATCH_DELAY_SECS),
            idle_interval: Duration::from_secs(DEFAULT_IDLE_SECS),
            directories: directory_pages(),
        }
    }
}

/// What one crawl iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A batch of this many addresses was scanned
    Scanned(usize),
    /// Frontier was empty and the directories offered nothing new
    Idle,
}

/// The crawl pipeline: frontier, pool, store and sinks
pub struct Crawler<C: Clock> {
    config: CrawlConfig,
    frontier: Frontier,
    pool: WorkerPool,
    store: ScanStore,
    sinks: OutcomeSinks,
    clock: C,
}

impl<C: Clock> Crawler<C> {
    /// Build a crawler whose frontier already excludes everything stored
    pub fn new(
        config: CrawlConfig,
        fetcher: Arc<dyn Fetcher>,
        store: ScanStore,
        sinks: OutcomeSinks,
        clock: C,
    ) -> Result<Self, CrawlError> {
        let stored = store.addresses()?;
        info!("Scan store holds {} addresses", stored.len());

        Ok(Self {
            pool: WorkerPool::new(fetcher, config.concurrency),
            frontier: Frontier::new(stored),
            config,
            store,
            sinks,
            clock,
        })
    }

    /// Offer seed addresses, returning how many were new
    pub fn seed(&mut self, seeds: impl IntoIterator<Item = Address>) -> usize {
        let queued = self.frontier.offer_all(seeds);
        info!("Seeded frontier with {} addresses", queued);
        queued
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn store(&self) -> &ScanStore {
        &self.store
    }

    /// Fetch every directory page and offer the addresses found.
    /// Failed pages are logged and skipped.
    pub async fn harvest(&mut self) -> usize {
        info!("🔄 Pulling new links from {} onion directories...", self.config.directories.len());

        let pages: Vec<Address> = self
            .config
            .directories
            .iter()
            .map(|d| Address::normalize(d))
            .collect();

        let mut queued = 0;
        for (page, outcome) in self.pool.fetch_batch(pages).await {
            match outcome {
                FetchOutcome::Success(fetched) => {
                    let found = extract_onions(&fetched.body, Some(page.as_str()));
                    let new = self
                        .frontier
                        .offer_all(found.iter().map(|token| Address::normalize(token)));
                    debug!("Directory {} listed {} addresses, {} new", page, found.len(), new);
                    queued += new;
                }
                FetchOutcome::Failure { reason } => {
                    warn!("Directory {} unavailable: {}", page, reason);
                }
            }
        }

        queued
    }

    /// Scan one batch from the frontier
    pub async fn scan_batch(&mut self) -> Result<usize, CrawlError> {
        let batch = self.frontier.next_batch(self.pool.concurrency());
        if batch.is_empty() {
            return Ok(0);
        }

        info!("🔎 Starting batch scan - {} remaining", self.frontier.len() + batch.len());

        let results = self.pool.fetch_batch(batch).await;
        let scanned = results.len();
        for (address, outcome) in results {
            self.record_outcome(address, outcome)?;
        }

        Ok(scanned)
    }

    /// Persist one fetch result. The store write happens before the sinks.
    fn record_outcome(&mut self, address: Address, outcome: FetchOutcome) -> Result<(), CrawlError> {
        let now = format_timestamp(self.clock.now());

        let (record, sink_record, discovered) = match outcome {
            FetchOutcome::Success(page) => {
                let extraction = extract_page(&page.body, address.as_str());
                let discovered = extraction.discovered_addresses();

                let record = ScanRecord {
                    address: address.clone(),
                    status: page.status,
                    title: extraction.metadata.title.clone(),
                    scanned_at: now.clone(),
                    key_blob: extraction.keys.blob.clone(),
                };

                let sink_record = SinkRecord::Success(SuccessRecord {
                    url: address.to_string(),
                    status: page.status,
                    title: extraction.metadata.title,
                    description: extraction.metadata.description,
                    headers: page.headers,
                    timestamp: now,
                    key_found: extraction.keys.found,
                    key_blob: extraction.keys.found.then_some(extraction.keys.blob),
                });

                (record, sink_record, discovered)
            }
            FetchOutcome::Failure { .. } => (
                ScanRecord::failed(address.clone(), &now),
                SinkRecord::failure(address.as_str(), &now),
                Vec::new(),
            ),
        };

        self.store.upsert(&record)?;

        match self.sinks.write(&sink_record)? {
            SinkRoute::Active => info!("[LIVE] {}", address),
            SinkRoute::Inactive => info!("[DEAD] {}", address),
        }

        if !record.key_blob.is_empty() {
            info!("Key material found on {}", address);
        }

        let queued = self.frontier.offer_all(discovered);
        if queued > 0 {
            debug!("{} queued {} new addresses", address, queued);
        }

        Ok(())
    }

    /// One iteration: harvest if the frontier is empty, then scan a batch
    pub async fn run_once(&mut self) -> Result<CycleOutcome, CrawlError> {
        if self.frontier.is_empty() && self.harvest().await == 0 {
            return Ok(CycleOutcome::Idle);
        }

        let scanned = self.scan_batch().await?;
        Ok(CycleOutcome::Scanned(scanned))
    }

    /// Crawl until cancelled or a persistence error occurs
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), CrawlError> {
        info!("Crawler starting with concurrency {}", self.pool.concurrency());

        while !cancel.is_cancelled() {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = self.run_once() => outcome?,
            };

            let pause = match outcome {
                CycleOutcome::Idle => {
                    info!("💤 No new links found. Sleeping for {}s...", self.config.idle_interval.as_secs());
                    self.config.idle_interval
                }
                CycleOutcome::Scanned(_) => self.config.batch_delay,
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!("🛑 Crawler stopped");
        Ok(())
    }
}
