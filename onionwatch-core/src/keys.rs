//! PGP key block extraction and fingerprints
//!
//! Key material is treated as opaque text. Blocks are recognized only by
//! their armor markers; the opening and closing marker must name the same
//! kind, so a PUBLIC header never pairs with a PRIVATE footer.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Armored PUBLIC or PRIVATE block. One alternative per kind, since the
/// regex engine has no backreferences to tie the footer to the header.
static KEY_BLOCK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)-----BEGIN PGP (?P<public>PUBLIC) KEY BLOCK-----.*?-----END PGP PUBLIC KEY BLOCK-----|-----BEGIN PGP (?P<private>PRIVATE) KEY BLOCK-----.*?-----END PGP PRIVATE KEY BLOCK-----",
    )
    .unwrap()
});

/// Separator placed between blocks in a key blob
pub const KEY_BLOB_SEPARATOR: &str = "\n\n";

/// Kind of armored key block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Public,
    Private,
}

/// One armored block, markers included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBlock {
    pub kind: KeyKind,
    pub text: String,
}

/// All key blocks found in a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyExtraction {
    pub blocks: Vec<KeyBlock>,
    /// Blocks joined with a blank line; empty when nothing matched
    pub blob: String,
    pub found: bool,
}

/// Scan text for armored key blocks
pub fn extract_key_blocks(text: &str) -> KeyExtraction {
    let blocks: Vec<KeyBlock> = KEY_BLOCK_REGEX
        .captures_iter(text)
        .map(|caps| {
            let kind = if caps.name("public").is_some() {
                KeyKind::Public
            } else {
                KeyKind::Private
            };
            KeyBlock {
                kind,
                text: caps[0].to_string(),
            }
        })
        .collect();

    let blob = blocks
        .iter()
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join(KEY_BLOB_SEPARATOR);

    KeyExtraction {
        found: !blocks.is_empty(),
        blocks,
        blob,
    }
}

/// Trim surrounding whitespace only. Internal line wrapping is left alone,
/// so two keys that differ only in wrapping are distinct.
pub fn normalize_key(key: &str) -> &str {
    key.trim()
}

/// SHA-256 hex digest of the trimmed key text
pub fn key_fingerprint(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_key(key).as_bytes());
    format!("{:x}", hasher.finalize())
}
