//! onionwatch core - domain model and extraction pipeline
//!
//! This crate provides the I/O-free building blocks:
//! - Onion address normalization
//! - Page extraction (metadata, outbound addresses)
//! - PGP key block extraction and fingerprints
//! - Scan records and sink record shapes
//! - Seed and directory registry

pub mod address;
pub mod extract;
pub mod keys;
pub mod record;
pub mod directories;

pub use address::*;
pub use extract::*;
pub use keys::*;
pub use record::*;
pub use directories::*;

/// Default number of concurrent fetches per batch
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default pause between batches, in seconds
pub const DEFAULT_BATCH_DELAY_SECS: u64 = 2;

/// Default idle interval when the directories yield nothing new, in seconds
pub const DEFAULT_IDLE_SECS: u64 = 60;

/// Default key-reuse scan interval, in seconds
pub const DEFAULT_DETECTOR_INTERVAL_SECS: u64 = 30;

/// Status recorded for a fetch that never produced a response
pub const FAILED_STATUS: u16 = 0;
