//! Storage trait and error types
//!
//! This module defines the trait interface for storage backends. The
//! operations mirror what the checker core needs: site lookup, page
//! collections with frontier-oriented filters, link-edge maintenance,
//! value upserts by natural key, and scheduled-page listings.

use crate::model::{PageRecord, ScheduledPageRecord, SiteRecord, ValueRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Page not found: {0}")]
    PageNotFound(i64),

    #[error("Site not found: {0}")]
    SiteNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
pub trait Storage {
    // ===== Site Management =====

    /// Creates a new site. Fails with `ConstraintViolation` when the name
    /// or the (scheme, host, base_path) triple already exists; no state is
    /// mutated in that case.
    fn create_site(
        &mut self,
        name: &str,
        scheme: &str,
        host: &str,
        base_path: &str,
    ) -> StorageResult<SiteRecord>;

    /// Gets a site by id
    fn get_site(&self, site_id: i64) -> StorageResult<SiteRecord>;

    /// Looks up a site by its unique name
    fn get_site_by_name(&self, name: &str) -> StorageResult<Option<SiteRecord>>;

    /// Lists all registered sites, ordered by name
    fn list_sites(&self) -> StorageResult<Vec<SiteRecord>>;

    /// Deletes every page of a site (links, values and schedules cascade).
    /// Returns the number of pages removed.
    fn delete_site_pages(&mut self, site_id: i64) -> StorageResult<usize>;

    // ===== Page Management =====

    /// Gets a page by id
    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord>;

    /// Looks up a page by its natural key within a site
    fn find_page(
        &self,
        site_id: i64,
        subpath: &str,
        params: &str,
    ) -> StorageResult<Option<PageRecord>>;

    /// Creates a new, never-checked page with the given initial status
    fn create_page(
        &mut self,
        site_id: i64,
        subpath: &str,
        params: &str,
        status: i32,
    ) -> StorageResult<PageRecord>;

    /// Two-step upsert by natural key: returns the existing page for
    /// (site, subpath, params), or creates it. The bool is true when a new
    /// page was created.
    fn load_or_create_page(
        &mut self,
        site_id: i64,
        subpath: &str,
        params: &str,
    ) -> StorageResult<(PageRecord, bool)>;

    /// Persists the mutable check-outcome fields of a page (checked flag,
    /// timestamps, status, content type, size, error message, linkable flag)
    fn save_page(&mut self, page: &PageRecord) -> StorageResult<()>;

    /// Deletes a page. Rejected with `ConstraintViolation` when the page
    /// still has incoming edges.
    fn delete_page(&mut self, page_id: i64) -> StorageResult<()>;

    /// Never-checked pages of a site, FIFO by discovery time
    fn unchecked_pages(&self, site_id: i64) -> StorageResult<Vec<PageRecord>>;

    /// Checked pages of a site, oldest-checked first
    fn checked_pages(&self, site_id: i64) -> StorageResult<Vec<PageRecord>>;

    /// Checked pages whose last status fell outside 200..=299, ordered so
    /// the page that has been in error longest comes first
    fn error_pages(&self, site_id: i64) -> StorageResult<Vec<PageRecord>>;

    /// Total number of pages of a site
    fn count_pages(&self, site_id: i64) -> StorageResult<u64>;

    /// Number of checked pages of a site
    fn count_checked_pages(&self, site_id: i64) -> StorageResult<u64>;

    // ===== Link Management =====

    /// Creates the edge (from, to) unless it already exists. Returns true
    /// when a new edge was created.
    fn create_link_if_absent(&mut self, from_page_id: i64, to_page_id: i64)
        -> StorageResult<bool>;

    /// Deletes the edge (from, to) if present
    fn delete_link(&mut self, from_page_id: i64, to_page_id: i64) -> StorageResult<()>;

    /// Deletes every outgoing edge of a page, returning how many were removed
    fn delete_outgoing_links(&mut self, page_id: i64) -> StorageResult<usize>;

    /// The destination page ids currently linked from a page
    fn outgoing_link_targets(&self, page_id: i64) -> StorageResult<Vec<i64>>;

    /// Number of edges pointing at a page
    fn incoming_link_count(&self, page_id: i64) -> StorageResult<u64>;

    /// Total number of edges originating from pages of a site
    fn count_links(&self, site_id: i64) -> StorageResult<u64>;

    // ===== Value Management =====

    /// Gets the value stored under (page, name), if any
    fn get_value(&self, page_id: i64, name: &str) -> StorageResult<Option<String>>;

    /// Inserts or overwrites the value for (page, name)
    fn upsert_value(&mut self, page_id: i64, name: &str, value: &str) -> StorageResult<()>;

    /// Deletes the values of a page whose names appear in `names`
    fn delete_values_by_names(&mut self, page_id: i64, names: &[String]) -> StorageResult<usize>;

    /// The names of every value stored for a page
    fn value_names(&self, page_id: i64) -> StorageResult<Vec<String>>;

    /// All values of a page, ordered by name
    fn values_for_page(&self, page_id: i64) -> StorageResult<Vec<ValueRecord>>;

    /// For one value name across a site: how many pages carry each distinct
    /// value. Returned as (value, page count) pairs.
    fn count_values(&self, site_id: i64, name: &str) -> StorageResult<Vec<(String, u64)>>;

    // ===== Scheduled Pages =====

    /// Attaches a rotation interval to a page, or updates an existing one
    fn schedule_page(&mut self, page_id: i64, rotation_secs: i64) -> StorageResult<()>;

    /// Removes the schedule of a page, if any
    fn unschedule_page(&mut self, page_id: i64) -> StorageResult<()>;

    /// All scheduled pages of a site, with the underlying page's
    /// last-checked time joined in for watermark computation
    fn scheduled_pages(&self, site_id: i64) -> StorageResult<Vec<ScheduledPageRecord>>;
}
