//! Frontier scheduling: which page gets checked next
//!
//! Selection runs through four tiers, first non-empty tier wins:
//!
//! 1. A scheduled page whose rotation interval has elapsed (earliest
//!    watermark first, lowest page id on ties).
//! 2. With probability one half, the page that has been in an error state
//!    the longest.
//! 3. The oldest never-checked page (FIFO by discovery time).
//! 4. The page whose last check is oldest.
//!
//! The coin flip in tier 2 keeps error retries from starving the rest of
//! the frontier. It is injected through the `Draw` trait so tests can
//! force either branch.

use crate::model::{PageRecord, SiteRecord};
use crate::storage::{Storage, StorageResult};
use chrono::{DateTime, Utc};

/// An error page is retried when the draw lands at or below this.
pub const ERROR_RETRY_PROBABILITY: f64 = 0.5;

/// Source of uniform draws in [0, 1) for the error-retry decision
pub trait Draw {
    fn draw(&mut self) -> f64;
}

/// Production draw source backed by the thread-local RNG
#[derive(Debug, Default)]
pub struct ThreadDraw;

impl Draw for ThreadDraw {
    fn draw(&mut self) -> f64 {
        rand::random::<f64>()
    }
}

/// Deterministic draw source for tests
#[derive(Debug)]
pub struct FixedDraw(pub f64);

impl Draw for FixedDraw {
    fn draw(&mut self) -> f64 {
        self.0
    }
}

/// Frontier selector for one site's pages
pub struct Frontier<D: Draw = ThreadDraw> {
    draw: D,
}

impl Frontier<ThreadDraw> {
    pub fn new() -> Self {
        Self { draw: ThreadDraw }
    }
}

impl Default for Frontier<ThreadDraw> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Draw> Frontier<D> {
    pub fn with_draw(draw: D) -> Self {
        Self { draw }
    }

    /// Picks the next page of a site to check, or `None` for an empty site.
    pub fn next_page<S: Storage>(
        &mut self,
        storage: &S,
        site: &SiteRecord,
    ) -> StorageResult<Option<PageRecord>> {
        self.next_page_at(storage, site, Utc::now())
    }

    /// Like `next_page` with an explicit clock, so due-ness is testable.
    pub fn next_page_at<S: Storage>(
        &mut self,
        storage: &S,
        site: &SiteRecord,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<PageRecord>> {
        if let Some(page_id) = self.due_scheduled_page(storage, site, now)? {
            tracing::debug!("Frontier: scheduled page {} is due", page_id);
            return storage.get_page(page_id).map(Some);
        }

        let errors = storage.error_pages(site.id)?;
        if !errors.is_empty() && self.draw.draw() <= ERROR_RETRY_PROBABILITY {
            let page = &errors[0];
            tracing::debug!("Frontier: retrying error page {}", page.id);
            return Ok(Some(page.clone()));
        }

        let unchecked = storage.unchecked_pages(site.id)?;
        if let Some(page) = unchecked.into_iter().next() {
            tracing::debug!("Frontier: next unchecked page {}", page.id);
            return Ok(Some(page));
        }

        let checked = storage.checked_pages(site.id)?;
        Ok(checked.into_iter().next())
    }

    /// The due scheduled page with the earliest watermark, ties broken by
    /// the lowest page id.
    fn due_scheduled_page<S: Storage>(
        &self,
        storage: &S,
        site: &SiteRecord,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<i64>> {
        let due = storage
            .scheduled_pages(site.id)?
            .into_iter()
            .filter(|s| s.is_due(now))
            .min_by_key(|s| (s.watermark(), s.page_id));
        Ok(due.map(|s| s.page_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::STATUS_UNREACHABLE;
    use crate::storage::SqliteStorage;
    use chrono::Duration;

    fn setup() -> (SqliteStorage, SiteRecord) {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let site = storage
            .create_site("demo", "https", "example.com", "/")
            .unwrap();
        (storage, site)
    }

    fn add_checked_page(
        storage: &mut SqliteStorage,
        site: &SiteRecord,
        subpath: &str,
        status: i32,
        checked_at: DateTime<Utc>,
    ) -> PageRecord {
        let mut page = storage
            .create_page(site.id, subpath, "", STATUS_UNREACHABLE)
            .unwrap();
        page.is_checked = true;
        page.checked_at = Some(checked_at);
        page.status = status;
        storage.save_page(&page).unwrap();
        page
    }

    #[test]
    fn test_empty_site_yields_none() {
        let (storage, site) = setup();
        let mut frontier = Frontier::with_draw(FixedDraw(0.0));
        assert!(frontier.next_page(&storage, &site).unwrap().is_none());
    }

    #[test]
    fn test_unchecked_pages_fifo() {
        let (mut storage, site) = setup();
        let first = storage
            .create_page(site.id, "/a", "", STATUS_UNREACHABLE)
            .unwrap();
        storage
            .create_page(site.id, "/b", "", STATUS_UNREACHABLE)
            .unwrap();

        // Draw above the threshold so an error page could never preempt.
        let mut frontier = Frontier::with_draw(FixedDraw(1.0));
        let next = frontier.next_page(&storage, &site).unwrap().unwrap();
        assert_eq!(next.id, first.id);
    }

    #[test]
    fn test_error_page_preempts_unchecked_on_low_draw() {
        let (mut storage, site) = setup();
        storage
            .create_page(site.id, "/fresh", "", STATUS_UNREACHABLE)
            .unwrap();
        let broken = add_checked_page(&mut storage, &site, "/broken", 500, Utc::now());

        let mut frontier = Frontier::with_draw(FixedDraw(0.25));
        let next = frontier.next_page(&storage, &site).unwrap().unwrap();
        assert_eq!(next.id, broken.id);
    }

    #[test]
    fn test_error_page_skipped_on_high_draw() {
        let (mut storage, site) = setup();
        let fresh = storage
            .create_page(site.id, "/fresh", "", STATUS_UNREACHABLE)
            .unwrap();
        add_checked_page(&mut storage, &site, "/broken", 500, Utc::now());

        let mut frontier = Frontier::with_draw(FixedDraw(0.75));
        let next = frontier.next_page(&storage, &site).unwrap().unwrap();
        assert_eq!(next.id, fresh.id);
    }

    #[test]
    fn test_oldest_error_page_first() {
        let (mut storage, site) = setup();
        let now = Utc::now();
        add_checked_page(&mut storage, &site, "/recent", 404, now);
        let oldest = add_checked_page(&mut storage, &site, "/old", 500, now - Duration::hours(2));

        let mut frontier = Frontier::with_draw(FixedDraw(0.0));
        let next = frontier.next_page(&storage, &site).unwrap().unwrap();
        assert_eq!(next.id, oldest.id);
    }

    #[test]
    fn test_scheduled_page_beats_error_page() {
        let (mut storage, site) = setup();
        let now = Utc::now();
        add_checked_page(&mut storage, &site, "/broken", 500, now);
        let scheduled = add_checked_page(
            &mut storage,
            &site,
            "/watched",
            200,
            now - Duration::hours(2),
        );
        storage.schedule_page(scheduled.id, 3600).unwrap();

        // Even a draw that would pick the error page loses to a due
        // scheduled page.
        let mut frontier = Frontier::with_draw(FixedDraw(0.0));
        let next = frontier.next_page_at(&storage, &site, now).unwrap().unwrap();
        assert_eq!(next.id, scheduled.id);
    }

    #[test]
    fn test_scheduled_page_not_due_is_ignored() {
        let (mut storage, site) = setup();
        let now = Utc::now();
        let watched = add_checked_page(
            &mut storage,
            &site,
            "/watched",
            200,
            now - Duration::minutes(10),
        );
        storage.schedule_page(watched.id, 3600).unwrap();
        let fresh = storage
            .create_page(site.id, "/fresh", "", STATUS_UNREACHABLE)
            .unwrap();

        let mut frontier = Frontier::with_draw(FixedDraw(1.0));
        let next = frontier.next_page_at(&storage, &site, now).unwrap().unwrap();
        assert_eq!(next.id, fresh.id);
    }

    #[test]
    fn test_fallback_revisits_oldest_checked() {
        let (mut storage, site) = setup();
        let now = Utc::now();
        add_checked_page(&mut storage, &site, "/newer", 200, now);
        let older = add_checked_page(&mut storage, &site, "/older", 200, now - Duration::hours(1));

        let mut frontier = Frontier::with_draw(FixedDraw(1.0));
        let next = frontier.next_page(&storage, &site).unwrap().unwrap();
        assert_eq!(next.id, older.id);
    }

    #[test]
    fn test_seed_site_has_single_unchecked_page() {
        let (mut storage, site) = setup();
        let seed = storage
            .create_page(site.id, "/", "", STATUS_UNREACHABLE)
            .unwrap();

        let mut frontier = Frontier::with_draw(FixedDraw(1.0));
        let next = frontier.next_page(&storage, &site).unwrap().unwrap();
        assert_eq!(next.id, seed.id);
        assert!(!next.is_checked);
        assert_eq!(storage.unchecked_pages(site.id).unwrap().len(), 1);
    }
}
