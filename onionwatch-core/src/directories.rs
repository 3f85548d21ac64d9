//! Seed and directory registry
//!
//! Fixed entry points for the crawl. Seeds are offered to the frontier at
//! startup; directories are re-harvested whenever the frontier runs dry.

/// Addresses offered to the frontier at startup
pub static SEED_ADDRESSES: &[&str] = &[
    "http://darkfailenbsdla5mal2mxn2uz66od5vtzd5qozslagrfzachha3f3id.onion",
    "http://propublica.securedrop.tor.onion",
    "http://onionrot.abusus.org",
    "http://onion.live/trending",
    "http://onionzwpil5nbukgflurrfvommx6aznkz7aaqh2gwm4qsxjj6yvihxid.onion",
    "http://torlistbsvieqsqctmi5fv2dbfxg7p3x77po7fhdcwfcr3xv5shxmzad.onion",
    "https://onionindex.org/",
    "https://tordir.org/",
    "http://ahmia.fi/onions",
];

/// Link directories harvested when the frontier is empty
pub static DIRECTORY_PAGES: &[&str] = &[
    "http://darkfailenbsdla5mal2mxn2uz66od5vtzd5qozslagrfzachha3f3id.onion",
    "http://propublica.securedrop.tor.onion",
    "http://onionrot.abusus.org",
    "http://onion.live/trending",
    "http://onionzwpil5nbukgflurrfvommx6aznkz7aaqh2gwm4qsxjj6yvihxid.onion",
    "http://torlistbsvieqsqctmi5fv2dbfxg7p3x77po7fhdcwfcr3xv5shxmzad.onion",
    "https://onionindex.org/",
    "https://tordir.org/",
    "http://ahmia.fi/onions",
];

/// Seed addresses in normalized form
pub fn seed_addresses() -> impl Iterator<Item = crate::Address> {
    SEED_ADDRESSES.iter().map(|s| crate::Address::normalize(s))
}

/// Directory pages as owned strings
pub fn directory_pages() -> Vec<String> {
    DIRECTORY_PAGES.iter().map(|s| s.to_string()).collect()
}
