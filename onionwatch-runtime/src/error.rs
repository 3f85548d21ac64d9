//! Runtime errors
//!
//! Only persistence problems surface here. Fetch and parse failures are
//! absorbed per address and never stop a loop.

use onionwatch_store::StoreError;
use thiserror::Error;

/// Fatal crawl errors
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Persistence failed: {0}")]
    Store(#[from] StoreError),
}

/// Fatal detector errors
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Store query failed: {0}")]
    Store(#[from] StoreError),

    #[error("Report write failed: {0}")]
    ReportWrite(#[source] StoreError),
}
