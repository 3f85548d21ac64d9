//! Fetch worker pool
//!
//! Runs a batch of fetches with at most `concurrency` outstanding at once and
//! returns once every member has finished. All fetches are driven from the
//! calling task, so callers keep plain `&mut` access to their own state.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::debug;

use onionwatch_core::Address;
use onionwatch_tor::{FetchOutcome, Fetcher};

/// Bounded-concurrency fetch executor
pub struct WorkerPool {
    fetcher: Arc<dyn Fetcher>,
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(fetcher: Arc<dyn Fetcher>, concurrency: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetch every address, returning outcomes in completion order
    pub async fn fetch_batch(&self, batch: Vec<Address>) -> Vec<(Address, FetchOutcome)> {
        debug!("Fetching batch of {} addresses", batch.len());

        stream::iter(batch)
            .map(|address| {
                let fetcher = Arc::clone(&self.fetcher);
                async move {
                    let outcome = fetcher.fetch(address.as_str()).await;
                    (address, outcome)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }
}
