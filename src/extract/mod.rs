//! HTML link extraction and content plausibility checks
//!
//! The extractor pulls candidate URLs out of a fetched document: anchor
//! hrefs, stylesheet hrefs, image srcs and script srcs, each category
//! de-duplicated. Anchor hrefs are pre-filtered against a small fixed list
//! of path prefixes (internal API and debug endpoints) that must never be
//! queued as crawlable pages.

use scraper::{Html, Selector};
use std::collections::BTreeSet;

/// Anchor path prefixes that are never admissible as crawlable pages.
/// Matched case-insensitively against the raw href.
const EXCLUDED_ANCHOR_PREFIXES: &[&str] = &["/api/", "/api2/", "/__debug__/"];

/// Candidate URLs found in one document, grouped by the tag they came from.
#[derive(Debug, Default)]
pub struct ExtractedLinks {
    pub styles: BTreeSet<String>,
    pub scripts: BTreeSet<String>,
    pub images: BTreeSet<String>,
    pub anchors: BTreeSet<String>,
}

impl ExtractedLinks {
    /// All candidates in consumption order: stylesheets, scripts, images,
    /// then anchors. The order carries no meaning beyond determinism.
    pub fn in_order(&self) -> impl Iterator<Item = &str> {
        self.styles
            .iter()
            .chain(self.scripts.iter())
            .chain(self.images.iter())
            .chain(self.anchors.iter())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.styles.len() + self.scripts.len() + self.images.len() + self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// True if an anchor href does not fall under an excluded path prefix.
pub fn is_admissible_anchor(href: &str) -> bool {
    let lowered = href.to_lowercase();
    !EXCLUDED_ANCHOR_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
}

/// Parses a document and collects candidate URLs from the four tag and
/// attribute pairs the link graph cares about.
pub fn extract_links(html: &str) -> ExtractedLinks {
    let document = Html::parse_document(html);
    let mut extracted = ExtractedLinks::default();

    collect_attr(&document, "link[href]", "href", &mut extracted.styles);
    collect_attr(&document, "script[src]", "src", &mut extracted.scripts);
    collect_attr(&document, "img[src]", "src", &mut extracted.images);

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            if let Some(href) = element.value().attr("href") {
                let href = href.trim();
                if !href.is_empty() && is_admissible_anchor(href) {
                    extracted.anchors.insert(href.to_string());
                }
            }
        }
    }

    extracted
}

fn collect_attr(document: &Html, selector: &str, attr: &str, out: &mut BTreeSet<String>) {
    if let Ok(selector) = Selector::parse(selector) {
        for element in document.select(&selector) {
            if let Some(value) = element.value().attr(attr) {
                let value = value.trim();
                if !value.is_empty() {
                    out.insert(value.to_string());
                }
            }
        }
    }
}

/// Checks whether a body is syntactically plausible HTML: a minimum length,
/// an `<html...>` open tag at the start after trimming, and a `</html>`
/// close tag at the end, all case-insensitive.
pub fn is_valid_html(body: &str) -> bool {
    let body = body.trim();
    if body.len() < 14 {
        return false;
    }
    let lowered = body.to_lowercase();
    lowered.starts_with("<html") && lowered.ends_with("</html>")
}
