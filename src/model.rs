//! Data model records shared between the checker core and storage
//!
//! A `Site` is one crawl target scoped to a scheme + host + base path. A
//! `Page` is one resource (sub-path + query params) within a site. `Link`,
//! `Value` and `ScheduledPage` hang off pages; their uniqueness rules are
//! enforced by the storage schema.

use chrono::{DateTime, Duration, TimeZone, Utc};
use url::Url;

/// Sentinel status for a page that was never reached (transport error,
/// or the freshly created seed page).
pub const STATUS_UNREACHABLE: i32 = -1;

/// Sentinel status for a page that claimed to be HTML but failed the
/// well-formedness heuristic.
pub const STATUS_UNEXPECTED_CONTENT: i32 = 418;

/// One crawl target: a unique name plus a base URL decomposed into
/// scheme, host and base path. Immutable after creation except by reset.
#[derive(Debug, Clone)]
pub struct SiteRecord {
    pub id: i64,
    pub name: String,
    pub scheme: String,
    pub host: String,
    pub base_path: String,
    pub created_at: DateTime<Utc>,
}

/// Returns the authority component of a URL (host, plus `:port` when a
/// non-default port is present).
pub fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or("");
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

impl SiteRecord {
    /// Composes an absolute URL from the site's scheme/host and the given
    /// path. An empty path yields the site's seed URL.
    pub fn url(&self, path: &str) -> String {
        let path = if path.is_empty() {
            self.base_path.as_str()
        } else {
            path
        };
        format!("{}://{}{}", self.scheme, self.host, path)
    }

    /// The seed URL this site was initialized with.
    pub fn seed_url(&self) -> String {
        self.url("")
    }

    /// True if the URL shares this site's scheme and host.
    pub fn is_local(&self, url: &Url) -> bool {
        url.scheme() == self.scheme && authority(url) == self.host
    }
}

/// One resource within a site. `(site_id, subpath, params)` is unique;
/// resolving the same effective URL twice always yields the same page.
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: i64,
    pub site_id: i64,
    /// Absolute path component of the page URL.
    pub subpath: String,
    /// Raw query string, empty when absent.
    pub params: String,
    pub is_checked: bool,
    pub checked_at: Option<DateTime<Utc>>,
    /// Seconds spent on the last check.
    pub check_time: f64,
    pub status: i32,
    pub content_type: String,
    pub size_bytes: i64,
    pub error_message: String,
    /// A page marked non-linkable cannot receive new incoming edges.
    pub is_linkable: bool,
    pub created_at: DateTime<Utc>,
}

impl PageRecord {
    /// True if the last check returned a 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// The page URL relative to its site: sub-path plus query string.
    pub fn relative_url(&self) -> String {
        if self.params.is_empty() {
            self.subpath.clone()
        } else {
            format!("{}?{}", self.subpath, self.params)
        }
    }

    /// The full absolute URL of the page, including scheme and host.
    pub fn full_url(&self, site: &SiteRecord) -> String {
        site.url(&self.relative_url())
    }
}

/// Splits an absolute URL into the (subpath, params) pair that identifies
/// a page within its site.
pub fn page_key(url: &Url) -> (String, String) {
    (
        url.path().to_string(),
        url.query().unwrap_or("").to_string(),
    )
}

/// A directed edge between two pages. At most one edge exists per ordered
/// pair of pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub id: i64,
    pub from_page_id: i64,
    pub to_page_id: i64,
}

/// A named fact attached to a page, produced by the plugin pipeline.
/// `(page_id, name)` is a natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRecord {
    pub id: i64,
    pub page_id: i64,
    pub name: String,
    pub value: String,
}

/// A mandatory recheck cadence attached to a page. The page becomes due
/// when now >= last-checked + rotation.
#[derive(Debug, Clone)]
pub struct ScheduledPageRecord {
    pub page_id: i64,
    pub rotation_secs: i64,
    /// Last-checked time of the underlying page; None when never checked.
    pub checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledPageRecord {
    /// The instant at which this page becomes due. A never-checked page
    /// counts from the epoch and is therefore due immediately.
    pub fn watermark(&self) -> DateTime<Utc> {
        let base = self
            .checked_at
            .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap());
        base + Duration::seconds(self.rotation_secs)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.watermark() <= now
    }
}
