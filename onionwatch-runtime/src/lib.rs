//! onionwatch runtime
//!
//! The two long-running loops:
//! - **Crawler**: frontier → worker pool → extraction → store and sinks
//! - **Detector**: store → key grouping → ledger and report
//!
//! Both take an injectable [`Clock`] and a cancellation token, and expose a
//! `run_once` that performs exactly one iteration.

pub mod clock;
pub mod error;
pub mod frontier;
pub mod pool;
pub mod crawler;
pub mod detector;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::*;
pub use error::*;
pub use frontier::*;
pub use pool::*;
pub use crawler::*;
pub use detector::*;
