//! SQLite scan store
//!
//! One row per address. The crawler is the only writer; the detector opens
//! its own read-only handle and re-queries every cycle. Every write runs in
//! autocommit mode, so it is durable before `upsert` returns.

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use onionwatch_core::{Address, KeyedRecord, ScanRecord};

use crate::StoreError;

/// How long a handle waits on a lock held by the other process
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS scanned (
    url TEXT PRIMARY KEY,
    status INTEGER NOT NULL,
    title TEXT NOT NULL,
    scanned_at TEXT NOT NULL,
    key_blob TEXT NOT NULL DEFAULT ''
);";

/// Totals over the scan store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub active: usize,
    pub failed: usize,
    pub keyed: usize,
}

/// Address-keyed record set backed by SQLite
pub struct ScanStore {
    db: Connection,
}

impl ScanStore {
    /// Open or create a read-write store
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Connection::open(path)?;
        db.busy_timeout(BUSY_TIMEOUT)?;
        db.execute_batch(SCHEMA)?;

        debug!("Opened scan store at {}", path.display());
        Ok(Self { db })
    }

    /// Open an existing store without write access
    pub fn open_read_only(path: &Path) -> Result<Self, StoreError> {
        let db = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        db.busy_timeout(BUSY_TIMEOUT)?;

        debug!("Opened scan store read-only at {}", path.display());
        Ok(Self { db })
    }

    /// Insert a record, fully replacing any previous one for the address
    pub fn upsert(&self, record: &ScanRecord) -> Result<(), StoreError> {
        self.db.execute(
            "INSERT OR REPLACE INTO scanned (url, status, title, scanned_at, key_blob)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.address.as_str(),
                record.status,
                record.title,
                record.scanned_at,
                record.key_blob
            ],
        )?;
        Ok(())
    }

    /// Fetch the record for one address
    pub fn get(&self, address: &str) -> Result<Option<ScanRecord>, StoreError> {
        let record = self
            .db
            .query_row(
                "SELECT url, status, title, scanned_at, key_blob FROM scanned WHERE url = ?1",
                params![address],
                |row| {
                    let url: String = row.get(0)?;
                    Ok(ScanRecord {
                        address: Address::normalize(&url),
                        status: row.get(1)?,
                        title: row.get(2)?,
                        scanned_at: row.get(3)?,
                        key_blob: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Every address already scanned
    pub fn addresses(&self) -> Result<HashSet<Address>, StoreError> {
        let mut stmt = self.db.prepare("SELECT url FROM scanned")?;
        let addresses = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|url| url.map(|u| Address::normalize(&u)))
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(addresses)
    }

    /// Every record with a non-empty key blob. Always a fresh query.
    pub fn keyed_records(&self) -> Result<Vec<KeyedRecord>, StoreError> {
        let mut stmt = self.db.prepare(
            "SELECT url, key_blob, title FROM scanned WHERE key_blob IS NOT NULL AND key_blob != ''",
        )?;
        let records = stmt
            .query_map([], |row| {
                Ok(KeyedRecord {
                    address: row.get(0)?,
                    key_blob: row.get(1)?,
                    title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Record totals
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let stats = self.db.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(status = 200), 0),
                    COALESCE(SUM(status = 0), 0),
                    COALESCE(SUM(key_blob != ''), 0)
             FROM scanned",
            [],
            |row| {
                Ok(StoreStats {
                    total: row.get::<_, i64>(0)? as usize,
                    active: row.get::<_, i64>(1)? as usize,
                    failed: row.get::<_, i64>(2)? as usize,
                    keyed: row.get::<_, i64>(3)? as usize,
                })
            },
        )?;
        Ok(stats)
    }
}
