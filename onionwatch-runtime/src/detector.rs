//! Key-reuse detector
//!
//! Periodically re-reads every keyed record from the store, groups them by
//! exact trimmed key text and reports each group spanning two or more
//! addresses exactly once.
//!
//! Grouping is strict string equality after trimming. Keys that differ only
//! in internal line wrapping land in separate groups, which can hide real
//! reuse; this is intentional until a normalization rule is agreed on.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use onionwatch_core::{
    format_timestamp, key_fingerprint, normalize_key, KeyMatch, KeyedRecord, SiteRef,
    DEFAULT_DETECTOR_INTERVAL_SECS, UNTITLED,
};
use onionwatch_store::{
    append_matches, load_reported_fingerprints, FingerprintLedger, ReportedMatch, ScanStore,
    DEFAULT_REPORT_FILE,
};

use crate::{Clock, DetectorError};

/// Detector configuration
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Pause between scans
    pub interval: Duration,
    /// Human-readable report, appended to
    pub report_path: PathBuf,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_DETECTOR_INTERVAL_SECS),
            report_path: PathBuf::from(DEFAULT_REPORT_FILE),
        }
    }
}

/// Group keyed records by trimmed key text, keeping groups with at least
/// two distinct addresses. Output is sorted by fingerprint.
pub fn find_reused_keys(records: &[KeyedRecord]) -> Vec<KeyMatch> {
    let mut groups: BTreeMap<&str, BTreeMap<&str, &str>> = BTreeMap::new();

    for record in records {
        groups
            .entry(normalize_key(&record.key_blob))
            .or_default()
            .insert(record.address.as_str(), record.title.as_str());
    }

    let mut matches: Vec<KeyMatch> = groups
        .into_iter()
        .filter(|(_, sites)| sites.len() >= 2)
        .map(|(key, sites)| KeyMatch {
            fingerprint: key_fingerprint(key),
            key_text: key.to_string(),
            sites: sites
                .into_iter()
                .map(|(address, title)| SiteRef {
                    address: address.to_string(),
                    title: if title.is_empty() {
                        UNTITLED.to_string()
                    } else {
                        title.to_string()
                    },
                })
                .collect(),
        })
        .collect();

    matches.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
    matches
}

/// Incremental key-reuse reporter
pub struct KeyReuseDetector<C: Clock> {
    config: DetectorConfig,
    store: ScanStore,
    ledger: FingerprintLedger,
    known: HashSet<String>,
    clock: C,
}

impl<C: Clock> KeyReuseDetector<C> {
    /// Load the known fingerprints from the ledger and from any existing
    /// report. Labels only present in the report are copied into the ledger.
    pub fn bootstrap(
        config: DetectorConfig,
        store: ScanStore,
        mut ledger: FingerprintLedger,
        clock: C,
    ) -> Result<Self, DetectorError> {
        let mut known = ledger.fingerprints()?;
        let from_report = load_reported_fingerprints(&config.report_path)?;

        let now = format_timestamp(clock.now());
        let imported: Vec<ReportedMatch> = from_report
            .difference(&known)
            .map(|fingerprint| ReportedMatch::label_only(fingerprint, &now))
            .collect();

        if !imported.is_empty() {
            info!(
                "Imported {} fingerprints from {}",
                imported.len(),
                config.report_path.display()
            );
            ledger.record(&imported)?;
        }

        known.extend(from_report);
        info!("Detector knows {} reported keys", known.len());

        Ok(Self {
            config,
            store,
            ledger,
            known,
            clock,
        })
    }

    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    pub fn is_known(&self, fingerprint: &str) -> bool {
        self.known.contains(fingerprint)
    }

    /// Reused keys not reported yet
    pub fn scan(&self) -> Result<Vec<KeyMatch>, DetectorError> {
        let records = self.store.keyed_records()?;
        debug!("Scanning {} keyed records", records.len());

        Ok(find_reused_keys(&records)
            .into_iter()
            .filter(|m| !self.known.contains(&m.fingerprint))
            .collect())
    }

    /// Append new matches to the report, then record them as known
    pub fn emit(&mut self, matches: Vec<KeyMatch>) -> Result<usize, DetectorError> {
        if matches.is_empty() {
            return Ok(0);
        }

        append_matches(&self.config.report_path, &matches).map_err(DetectorError::ReportWrite)?;

        let now = format_timestamp(self.clock.now());
        let rows: Vec<ReportedMatch> = matches
            .into_iter()
            .map(|m| ReportedMatch::new(m, &now))
            .collect();
        self.ledger.record(&rows)?;

        self.known
            .extend(rows.iter().map(|r| r.key_match.fingerprint.clone()));
        Ok(rows.len())
    }

    /// One scan-and-emit cycle
    pub fn run_once(&mut self) -> Result<usize, DetectorError> {
        let matches = self.scan()?;
        let emitted = self.emit(matches)?;

        if emitted > 0 {
            info!(
                "✅ {} new reused PGP key(s) found and written to {}",
                emitted,
                self.config.report_path.display()
            );
        } else {
            info!("🔄 No new reused PGP keys found.");
        }

        Ok(emitted)
    }

    /// Scan until cancelled or a store/report error occurs
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), DetectorError> {
        info!("🔍 Key monitor running - will update when reused keys are found");

        while !cancel.is_cancelled() {
            self.run_once()?;

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        info!("🛑 Monitor stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedClock;
    use chrono::TimeZone;
    use onionwatch_core::{Address, ScanRecord};
    use onionwatch_store::{render_match, DEFAULT_LEDGER_FILE};
    use std::path::Path;
    use tempfile::TempDir;

    fn clock() -> FixedClock {
        FixedClock(chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
    }

    fn keyed(address: &str, key: &str, title: &str) -> KeyedRecord {
        KeyedRecord {
            address: address.to_string(),
            key_blob: key.to_string(),
            title: title.to_string(),
        }
    }

    fn put(store: &ScanStore, address: &str, key: &str) {
        store
            .upsert(&ScanRecord {
                address: Address::normalize(address),
                status: 200,
                title: String::new(),
                scanned_at: "2024-03-01T12:00:00.000000Z".to_string(),
                key_blob: key.to_string(),
            })
            .unwrap();
    }

    struct Fixture {
        dir: TempDir,
        writer: ScanStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let writer = ScanStore::open(&dir.path().join("scan.db")).unwrap();
            Self { dir, writer }
        }

        fn report_path(&self) -> PathBuf {
            self.dir.path().join(DEFAULT_REPORT_FILE)
        }

        fn detector(&self) -> KeyReuseDetector<FixedClock> {
            let config = DetectorConfig {
                interval: Duration::from_secs(30),
                report_path: self.report_path(),
            };
            let store = ScanStore::open_read_only(&self.dir.path().join("scan.db")).unwrap();
            let ledger = FingerprintLedger::open(&self.dir.path().join(DEFAULT_LEDGER_FILE)).unwrap();
            KeyReuseDetector::bootstrap(config, store, ledger, clock()).unwrap()
        }
    }

    fn report_blocks(path: &Path) -> usize {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .matches("Key Fingerprint (SHA-256):")
            .count()
    }

    #[test]
    fn test_identical_keys_group() {
        let matches = find_reused_keys(&[
            keyed("http://x.onion", "A\n", "X"),
            keyed("http://y.onion", "A\n", ""),
        ]);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].key_text, "A");
        assert_eq!(matches[0].fingerprint, key_fingerprint("A"));
        assert_eq!(matches[0].sites[1].title, UNTITLED);
    }

    #[test]
    fn test_one_character_difference_never_groups() {
        let matches = find_reused_keys(&[
            keyed("http://x.onion", "A\nB", "X"),
            keyed("http://y.onion", "A\nC", "Y"),
        ]);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_internal_wrapping_not_normalized() {
        let matches = find_reused_keys(&[
            keyed("http://x.onion", "AAAA\nBBBB", "X"),
            keyed("http://y.onion", "AAAABBBB", "Y"),
            keyed("http://z.onion", "aaaa\nbbbb", "Z"),
        ]);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_single_site_is_not_reuse() {
        let matches = find_reused_keys(&[keyed("http://x.onion", "A", "X")]);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_reports_once_then_nothing() {
        let fx = Fixture::new();
        put(&fx.writer, "http://x.onion", "A\n");
        put(&fx.writer, "http://y.onion", "A\n");
        put(&fx.writer, "http://z.onion", "B");

        let mut detector = fx.detector();
        assert_eq!(detector.run_once().unwrap(), 1);
        assert_eq!(report_blocks(&fx.report_path()), 1);

        let before = std::fs::read_to_string(fx.report_path()).unwrap();
        assert_eq!(detector.run_once().unwrap(), 0);
        let after = std::fs::read_to_string(fx.report_path()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_new_reuse_picked_up_on_later_cycle() {
        let fx = Fixture::new();
        put(&fx.writer, "http://x.onion", "A");
        let mut detector = fx.detector();
        assert_eq!(detector.run_once().unwrap(), 0);

        put(&fx.writer, "http://y.onion", "A");
        assert_eq!(detector.run_once().unwrap(), 1);
        assert!(detector.is_known(&key_fingerprint("A")));
    }

    #[test]
    fn test_restart_remembers_reported_keys() {
        let fx = Fixture::new();
        put(&fx.writer, "http://x.onion", "A");
        put(&fx.writer, "http://y.onion", "A");

        assert_eq!(fx.detector().run_once().unwrap(), 1);

        let mut restarted = fx.detector();
        assert_eq!(restarted.known_count(), 1);
        assert_eq!(restarted.run_once().unwrap(), 0);
        assert_eq!(report_blocks(&fx.report_path()), 1);
    }

    #[test]
    fn test_legacy_report_labels_are_known() {
        let fx = Fixture::new();
        put(&fx.writer, "http://x.onion", "A");
        put(&fx.writer, "http://y.onion", "A");

        let legacy = find_reused_keys(&fx.writer.keyed_records().unwrap());
        std::fs::write(fx.report_path(), render_match(&legacy[0])).unwrap();

        let mut detector = fx.detector();
        assert!(detector.is_known(&key_fingerprint("A")));
        assert_eq!(detector.run_once().unwrap(), 0);

        let ledger = FingerprintLedger::open(&fx.dir.path().join(DEFAULT_LEDGER_FILE)).unwrap();
        assert!(ledger.fingerprints().unwrap().contains(&key_fingerprint("A")));
    }

    #[test]
    fn test_report_write_failure_is_fatal() {
        let fx = Fixture::new();
        put(&fx.writer, "http://x.onion", "A");
        put(&fx.writer, "http://y.onion", "A");

        let config = DetectorConfig {
            interval: Duration::from_secs(30),
            report_path: fx.dir.path().join("no-such-dir").join("report.txt"),
        };
        let store = ScanStore::open_read_only(&fx.dir.path().join("scan.db")).unwrap();
        let ledger = FingerprintLedger::open(&fx.dir.path().join(DEFAULT_LEDGER_FILE)).unwrap();
        let mut detector = KeyReuseDetector::bootstrap(config, store, ledger, clock()).unwrap();

        let result = detector.run_once();
        assert!(matches!(result, Err(DetectorError::ReportWrite(_))));
        assert_eq!(detector.known_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cycles_until_cancelled() {
        let fx = Fixture::new();
        put(&fx.writer, "http://x.onion", "A");
        put(&fx.writer, "http://y.onion", "A");
        let mut detector = fx.detector();

        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(95)).await;
            stopper.cancel();
        });

        detector.run(cancel).await.unwrap();
        assert_eq!(report_blocks(&fx.report_path()), 1);
    }
}
