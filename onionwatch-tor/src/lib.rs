//! onionwatch Tor layer
//!
//! Provides Tor-based networking for onion discovery:
//! - SOCKS5h proxy client (DNS resolution via Tor)
//! - `Fetcher` abstraction that never fails, only reports outcomes

pub mod proxy;
pub mod fetch;

pub use proxy::*;
pub use fetch::*;
