//! Onion address normalization
//!
//! Addresses are plain strings compared exactly. Bare v3 tokens found in
//! page content are promoted to `http://` URLs before they reach the frontier.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Tor v3 onion token: 56 base32 characters plus the `.onion` suffix
pub static ONION_V3_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[a-z2-7]{56}\.onion\b").unwrap()
});

/// A normalized endpoint identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Normalize a raw token or URL.
    ///
    /// Anything already carrying an `http`/`https` scheme is kept verbatim;
    /// anything else is treated as a bare host and gets `http://` prepended.
    pub fn normalize(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http") {
            Self(raw.to_string())
        } else {
            Self(format!("http://{}", raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self::normalize(raw)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "dreadytofatroptsdj6io7l3xptbet6onoyno2yv7jicoxknyazubrad.onion";

    #[test]
    fn test_normalize_bare_token() {
        let addr = Address::normalize(TOKEN);
        assert_eq!(addr.as_str(), format!("http://{}", TOKEN));
    }

    #[test]
    fn test_normalize_keeps_scheme() {
        let addr = Address::normalize("https://tordir.org/");
        assert_eq!(addr.as_str(), "https://tordir.org/");
    }
}
