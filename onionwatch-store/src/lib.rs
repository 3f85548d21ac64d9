//! onionwatch persistence
//!
//! Everything that touches disk:
//! - **Store**: SQLite table of scan records, one row per address
//! - **Sinks**: append-only JSONL logs partitioned by outcome
//! - **Ledger**: SQLite table of key fingerprints already reported
//! - **Report**: human-readable key-reuse report

pub mod error;
pub mod store;
pub mod sinks;
pub mod ledger;
pub mod report;

pub use error::*;
pub use store::*;
pub use sinks::*;
pub use ledger::*;
pub use report::*;
