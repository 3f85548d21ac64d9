//! Page extraction pipeline
//!
//! Pure functions turning fetched HTML into metadata, outbound onion
//! addresses and key blocks. Nothing here performs I/O and parse problems
//! never surface as errors: missing pieces come back empty.

use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use url::Url;

use crate::{extract_key_blocks, Address, KeyExtraction, ONION_V3_REGEX};

static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static DESCRIPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="description"]"#).unwrap());
static OG_DESCRIPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:description"]"#).unwrap());
static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Descriptive metadata pulled from a page head
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    /// Trimmed text of the first `<title>` element
    pub title: String,
    /// `meta[name=description]`, falling back to `meta[property=og:description]`
    pub description: String,
}

/// Everything the pipeline derives from one fetched page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtraction {
    pub metadata: PageMetadata,
    /// Bare onion tokens, sorted and deduplicated
    pub onion_tokens: BTreeSet<String>,
    pub keys: KeyExtraction,
}

impl PageExtraction {
    /// Discovered tokens in absolute frontier form
    pub fn discovered_addresses(&self) -> Vec<Address> {
        self.onion_tokens
            .iter()
            .map(|token| Address::normalize(token))
            .collect()
    }
}

/// Run the whole pipeline over a page fetched from `base_url`
pub fn extract_page(html: &str, base_url: &str) -> PageExtraction {
    let document = Html::parse_document(html);

    PageExtraction {
        metadata: metadata_from_document(&document),
        onion_tokens: onions_from_document(html, &document, Some(base_url)),
        keys: extract_key_blocks(html),
    }
}

/// Extract title and description from HTML
pub fn extract_metadata(html: &str) -> PageMetadata {
    let document = Html::parse_document(html);
    metadata_from_document(&document)
}

/// Extract onion tokens from raw text and from every `<a href>`.
///
/// Hrefs are resolved against `base_url` when one is given and parses as a
/// URL, then matched with the same token grammar as the raw text scan.
pub fn extract_onions(html: &str, base_url: Option<&str>) -> BTreeSet<String> {
    let document = Html::parse_document(html);
    onions_from_document(html, &document, base_url)
}

fn metadata_from_document(document: &Html) -> PageMetadata {
    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let description = document
        .select(&DESCRIPTION_SELECTOR)
        .next()
        .or_else(|| document.select(&OG_DESCRIPTION_SELECTOR).next())
        .and_then(|el| el.value().attr("content"))
        .unwrap_or_default()
        .to_string();

    PageMetadata { title, description }
}

fn onions_from_document(html: &str, document: &Html, base_url: Option<&str>) -> BTreeSet<String> {
    let mut onions: BTreeSet<String> = ONION_V3_REGEX
        .find_iter(html)
        .map(|m| m.as_str().to_string())
        .collect();

    let base = base_url.and_then(|b| Url::parse(b).ok());

    for element in document.select(&LINK_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let resolved = match &base {
            Some(base) => base
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        };

        if let Some(m) = ONION_V3_REGEX.find(&resolved) {
            onions.insert(m.as_str().to_string());
        }
    }

    onions
}
