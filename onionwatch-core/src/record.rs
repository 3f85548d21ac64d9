//! Scan records and outcome sink records

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Address, FAILED_STATUS};

/// Error text written to the sinks for any failed fetch. The underlying
/// reason only goes to the logs.
pub const FETCH_FAILED: &str = "Fetch failed";

/// Title shown for keyed sites that had no `<title>`
pub const UNTITLED: &str = "(No Title Found)";

/// Format a timestamp the way records store it (RFC 3339, microseconds, `Z`)
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// The persisted result of scanning one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub address: Address,
    /// HTTP status, or 0 when the fetch failed
    pub status: u16,
    pub title: String,
    pub scanned_at: String,
    /// Concatenated key blocks; empty when none were found
    pub key_blob: String,
}

impl ScanRecord {
    /// Record for an address whose fetch never produced a response
    pub fn failed(address: Address, scanned_at: &str) -> Self {
        Self {
            address,
            status: FAILED_STATUS,
            title: String::new(),
            scanned_at: scanned_at.to_string(),
            key_blob: String::new(),
        }
    }
}

/// A stored record carrying key material, as read by the detector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedRecord {
    pub address: String,
    pub key_blob: String,
    pub title: String,
}

/// One site carrying a reused key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteRef {
    pub address: String,
    pub title: String,
}

/// A key shared by two or more distinct addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMatch {
    pub fingerprint: String,
    /// Trimmed key text the sites were grouped by
    pub key_text: String,
    pub sites: Vec<SiteRef>,
}

/// Sink line for a fetch that produced a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessRecord {
    pub url: String,
    pub status: u16,
    pub title: String,
    pub description: String,
    pub headers: BTreeMap<String, String>,
    pub timestamp: String,
    pub key_found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_blob: Option<String>,
}

/// Sink line for a fetch that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub url: String,
    pub status: u16,
    pub error: String,
    pub timestamp: String,
}

/// One line in the outcome sinks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SinkRecord {
    Success(SuccessRecord),
    Failure(FailureRecord),
}

impl SinkRecord {
    pub fn failure(url: &str, timestamp: &str) -> Self {
        SinkRecord::Failure(FailureRecord {
            url: url.to_string(),
            status: FAILED_STATUS,
            error: FETCH_FAILED.to_string(),
            timestamp: timestamp.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        match self {
            SinkRecord::Success(r) => &r.url,
            SinkRecord::Failure(r) => &r.url,
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            SinkRecord::Success(r) => r.status,
            SinkRecord::Failure(r) => r.status,
        }
    }

    /// Only a plain 200 counts as live
    pub fn is_active(&self) -> bool {
        self.status() == 200
    }
}
