//! Fingerprint ledger
//!
//! Durable record of every reused key already reported. The detector's
//! known-set is loaded from here at startup, and the report can be
//! regenerated from it at any time.

use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use onionwatch_core::{KeyMatch, SiteRef};

use crate::StoreError;

/// Default ledger file name
pub const DEFAULT_LEDGER_FILE: &str = "key_ledger.db";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS reported_keys (
    fingerprint TEXT PRIMARY KEY,
    key_text TEXT NOT NULL,
    sites TEXT NOT NULL,
    reported_at TEXT NOT NULL
);";

/// A ledger row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedMatch {
    pub key_match: KeyMatch,
    pub reported_at: String,
}

impl ReportedMatch {
    pub fn new(key_match: KeyMatch, reported_at: &str) -> Self {
        Self {
            key_match,
            reported_at: reported_at.to_string(),
        }
    }

    /// Row for a fingerprint known only from an older report's label
    pub fn label_only(fingerprint: &str, reported_at: &str) -> Self {
        Self::new(
            KeyMatch {
                fingerprint: fingerprint.to_string(),
                key_text: String::new(),
                sites: Vec::new(),
            },
            reported_at,
        )
    }

    pub fn is_label_only(&self) -> bool {
        self.key_match.key_text.is_empty() && self.key_match.sites.is_empty()
    }
}

/// SQLite-backed set of reported fingerprints
pub struct FingerprintLedger {
    db: Connection,
}

impl FingerprintLedger {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Connection::open(path)?;
        db.busy_timeout(Duration::from_secs(10))?;
        db.execute_batch(SCHEMA)?;

        debug!("Opened fingerprint ledger at {}", path.display());
        Ok(Self { db })
    }

    /// Every fingerprint ever reported
    pub fn fingerprints(&self) -> Result<HashSet<String>, StoreError> {
        let mut stmt = self.db.prepare("SELECT fingerprint FROM reported_keys")?;
        let fingerprints = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(fingerprints)
    }

    /// Record reported rows in one transaction. Rows already present keep
    /// their original content and position.
    pub fn record(&mut self, rows: &[ReportedMatch]) -> Result<(), StoreError> {
        let tx = self.db.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO reported_keys (fingerprint, key_text, sites, reported_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in rows {
                let sites = serde_json::to_string(&row.key_match.sites)?;
                stmt.execute(params![
                    row.key_match.fingerprint,
                    row.key_match.key_text,
                    sites,
                    row.reported_at
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// All rows in the order they were first recorded
    pub fn all(&self) -> Result<Vec<ReportedMatch>, StoreError> {
        let mut stmt = self.db.prepare(
            "SELECT fingerprint, key_text, sites, reported_at FROM reported_keys ORDER BY rowid",
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(fingerprint, key_text, sites, reported_at)| -> Result<ReportedMatch, StoreError> {
                let sites: Vec<SiteRef> = serde_json::from_str(&sites)?;
                Ok(ReportedMatch {
                    key_match: KeyMatch {
                        fingerprint,
                        key_text,
                        sites,
                    },
                    reported_at,
                })
            })
            .collect()
    }
}
