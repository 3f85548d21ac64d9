//! Key-reuse report
//!
//! Append-only text, one block per reused key. Each block carries a
//! `Key Fingerprint (SHA-256): <hex>` label, which is also how fingerprints
//! from an existing report are recovered at startup.

use regex::Regex;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::sync::LazyLock;

use onionwatch_core::KeyMatch;

use crate::{ReportedMatch, StoreError};

static FINGERPRINT_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Key Fingerprint \(SHA-256\): (\w+)").unwrap()
});

const BANNER: &str = "====================================================================";
const FOOTER: &str = "--------------------------------------------------------------------";

/// Default report file name
pub const DEFAULT_REPORT_FILE: &str = "pgp_matches.txt";

/// Pull every fingerprint label out of report text
pub fn parse_reported_fingerprints(text: &str) -> HashSet<String> {
    FINGERPRINT_LABEL_REGEX
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Read fingerprint labels from a report file; a missing file has none
pub fn load_reported_fingerprints(path: &Path) -> Result<HashSet<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(parse_reported_fingerprints(&text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashSet::new()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Render the report block for one match
pub fn render_match(m: &KeyMatch) -> String {
    let mut out = String::new();
    out.push_str(BANNER);
    out.push_str("\n🔐 Reused PGP Key Match\n");
    out.push_str(BANNER);
    out.push('\n');
    out.push_str(&format!("Used by {} onion site(s)\n", m.sites.len()));
    out.push_str(&format!("Key Fingerprint (SHA-256): {}\n\n", m.fingerprint));
    out.push_str(&m.key_text);
    out.push_str("\n\n");
    out.push_str("🧭 Associated .onion URLs:\n");
    for site in &m.sites {
        out.push_str(&format!(" - {:<40} | \"{}\"\n", site.address, site.title));
    }
    out.push('\n');
    out.push_str(FOOTER);
    out.push_str("\n\n");
    out
}

fn render_label_only(fingerprint: &str) -> String {
    format!(
        "{banner}\n🔐 Reused PGP Key Match\n{banner}\nKey Fingerprint (SHA-256): {fingerprint}\n\n(imported from an earlier report; details not recorded)\n\n{FOOTER}\n\n",
        banner = BANNER,
    )
}

/// Append blocks for new matches in a single write
pub fn append_matches(path: &Path, matches: &[KeyMatch]) -> Result<(), StoreError> {
    if matches.is_empty() {
        return Ok(());
    }

    let text: String = matches.iter().map(render_match).collect();

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;
    file.write_all(text.as_bytes())
        .map_err(|e| StoreError::io(path, e))
}

/// Rewrite the whole report from ledger rows, in the order given
pub fn write_report(path: &Path, rows: &[ReportedMatch]) -> Result<(), StoreError> {
    let text: String = rows
        .iter()
        .map(|row| {
            if row.is_label_only() {
                render_label_only(&row.key_match.fingerprint)
            } else {
                render_match(&row.key_match)
            }
        })
        .collect();

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, text).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use onionwatch_core::SiteRef;

    fn key_match(fingerprint: &str) -> KeyMatch {
        KeyMatch {
            fingerprint: fingerprint.to_string(),
            key_text: "-----BEGIN PGP PUBLIC KEY BLOCK-----\nabc\n-----END PGP PUBLIC KEY BLOCK-----"
                .to_string(),
            sites: vec![
                SiteRef {
                    address: "http://a.onion".to_string(),
                    title: "Site A".to_string(),
                },
                SiteRef {
                    address: "http://b.onion".to_string(),
                    title: "Site B".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_render_match_layout() {
        let block = render_match(&key_match("abc123"));

        assert!(block.starts_with(BANNER));
        assert!(block.contains("Used by 2 onion site(s)\n"));
        assert!(block.contains("Key Fingerprint (SHA-256): abc123\n"));
        assert!(block.contains("-----END PGP PUBLIC KEY BLOCK-----\n\n🧭"));
        assert!(block.contains(&format!(" - {:<40} | \"Site A\"\n", "http://a.onion")));
        assert!(block.ends_with(&format!("{}\n\n", FOOTER)));
    }

    #[test]
    fn test_rendered_labels_parse_back() {
        let text = format!("{}{}", render_match(&key_match("aaa")), render_match(&key_match("bbb")));
        let labels = parse_reported_fingerprints(&text);
        assert_eq!(labels.len(), 2);
        assert!(labels.contains("aaa"));
        assert!(labels.contains("bbb"));
    }

    #[test]
    fn test_missing_report_has_no_labels() {
        let dir = tempfile::tempdir().unwrap();
        let labels = load_reported_fingerprints(&dir.path().join("none.txt")).unwrap();
        assert!(labels.is_empty());
    }

    #[test]
    fn test_append_matches_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_REPORT_FILE);

        append_matches(&path, &[key_match("aaa")]).unwrap();
        append_matches(&path, &[]).unwrap();
        append_matches(&path, &[key_match("bbb")]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("Key Fingerprint (SHA-256):").count(), 2);
        assert!(text.find("aaa").unwrap() < text.find("bbb").unwrap());
    }

    #[test]
    fn test_write_report_keeps_label_only_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_REPORT_FILE);
        let rows = vec![
            ReportedMatch::label_only("legacy1", "t0"),
            ReportedMatch::new(key_match("fresh"), "t1"),
        ];

        write_report(&path, &rows).unwrap();

        let labels = load_reported_fingerprints(&path).unwrap();
        assert_eq!(labels.len(), 2);
        assert!(labels.contains("legacy1"));
        assert!(!path.with_extension("tmp").exists());
    }
}
