//! Check orchestration
//!
//! `PageChecker` owns the storage backend, HTTP client, robots cache,
//! plugin registry and frontier, and drives the per-page check cycle:
//! validate with a HEAD request, classify, fetch the body for local HTML,
//! reconcile the link graph, run the plugin pipeline. Every terminal path
//! persists the page before returning, so an interrupted run never leaves
//! a half-checked page behind.

use super::frontier::{Draw, Frontier, ThreadDraw};
use super::http::{build_http_client, get_url, head_url};
use super::links::reconcile_links;
use crate::config::Config;
use crate::extract::is_valid_html;
use crate::model::{page_key, PageRecord, SiteRecord, STATUS_UNEXPECTED_CONTENT, STATUS_UNREACHABLE};
use crate::plugins::{run_plugins, PluginRegistry};
use crate::robots::RobotsCache;
use crate::storage::Storage;
use crate::{LinkwardError, Result};
use chrono::Utc;
use reqwest::Client;
use std::time::Instant;
use url::Url;

/// Terminal classification of one page check
#[derive(Debug)]
pub enum CheckOutcome {
    /// Local HTML page fully processed
    Processed {
        url: String,
        status: i32,
        links_added: usize,
        links_removed: usize,
        plugin_failures: Vec<String>,
    },
    /// Local page that is alive but not HTML; recorded, never parsed
    NotHtml { url: String, content_type: String },
    /// Redirected off the site; outgoing edges dropped
    OffSite {
        url: String,
        final_url: String,
        links_dropped: usize,
    },
    /// HEAD validation failed: bad status, or unreachable
    ValidationFailed {
        url: String,
        status: i32,
        message: String,
    },
    /// Claimed to be HTML but the body does not look like it
    UnexpectedContent { url: String, message: String },
}

impl CheckOutcome {
    /// True when the check reached and recorded a healthy page. An off-site
    /// redirect is a recorded success; only validation and content-shape
    /// failures count against the page.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            CheckOutcome::Processed { .. }
                | CheckOutcome::NotHtml { .. }
                | CheckOutcome::OffSite { .. }
        )
    }

    pub fn url(&self) -> &str {
        match self {
            CheckOutcome::Processed { url, .. }
            | CheckOutcome::NotHtml { url, .. }
            | CheckOutcome::OffSite { url, .. }
            | CheckOutcome::ValidationFailed { url, .. }
            | CheckOutcome::UnexpectedContent { url, .. } => url,
        }
    }
}

/// Drives checks for the sites of one storage backend
pub struct PageChecker<S: Storage, D: Draw = ThreadDraw> {
    storage: S,
    client: Client,
    plugins: PluginRegistry,
    robots: RobotsCache,
    frontier: Frontier<D>,
}

impl<S: Storage> PageChecker<S, ThreadDraw> {
    /// Creates a checker with the production frontier and built-in plugins.
    pub fn new(storage: S, config: &Config) -> Result<Self> {
        let client = build_http_client(
            &config.user_agent.user_agent_string(),
            config.checker.request_timeout_secs,
        )?;
        Ok(Self {
            storage,
            client,
            plugins: PluginRegistry::with_builtins(),
            robots: RobotsCache::new(),
            frontier: Frontier::new(),
        })
    }
}

impl<S: Storage, D: Draw> PageChecker<S, D> {
    /// Assembles a checker from explicit parts. Used by tests that need a
    /// deterministic frontier or a custom plugin set.
    pub fn with_parts(storage: S, client: Client, plugins: PluginRegistry, frontier: Frontier<D>) -> Self {
        Self {
            storage,
            client,
            plugins,
            robots: RobotsCache::new(),
            frontier,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn robots_mut(&mut self) -> &mut RobotsCache {
        &mut self.robots
    }

    /// Registers a site and seeds its frontier with one never-checked page
    /// at the URL's path.
    pub fn init_site(&mut self, name: &str, url: &str) -> Result<SiteRecord> {
        if self.storage.get_site_by_name(name)?.is_some() {
            return Err(LinkwardError::SiteExists(name.to_string()));
        }

        let parsed = Url::parse(url)?;
        let host = crate::model::authority(&parsed);
        // A site is scoped to scheme/host/base-path; any query string on the
        // given URL is not part of its identity and is dropped from the seed.
        let base_path = parsed.path().to_string();

        let site = self
            .storage
            .create_site(name, parsed.scheme(), &host, &base_path)?;
        self.storage
            .create_page(site.id, &base_path, "", STATUS_UNREACHABLE)?;

        tracing::info!("Initialized site '{}' at {}", name, site.seed_url());
        Ok(site)
    }

    /// Deletes every page of a site and re-seeds it, keeping the site row.
    pub fn reset_site(&mut self, name: &str) -> Result<SiteRecord> {
        let site = self
            .storage
            .get_site_by_name(name)?
            .ok_or_else(|| LinkwardError::SiteNotFound(name.to_string()))?;

        let removed = self.storage.delete_site_pages(site.id)?;
        self.storage
            .create_page(site.id, &site.base_path, "", STATUS_UNREACHABLE)?;

        tracing::info!("Reset site '{}': {} pages removed", name, removed);
        Ok(site)
    }

    /// Looks a site up by name, as the CLI refers to sites.
    pub fn site_by_name(&self, name: &str) -> Result<SiteRecord> {
        self.storage
            .get_site_by_name(name)?
            .ok_or_else(|| LinkwardError::SiteNotFound(name.to_string()))
    }

    /// Fraction of the site already checked: (checked, total, percent).
    pub fn progress(&self, site: &SiteRecord) -> Result<(u64, u64, f64)> {
        let total = self.storage.count_pages(site.id)?;
        let checked = self.storage.count_checked_pages(site.id)?;
        let percent = if total == 0 {
            0.0
        } else {
            checked as f64 / total as f64 * 100.0
        };
        Ok((checked, total, percent))
    }

    /// Checks the frontier's next page, or returns `None` for an empty site.
    pub async fn check_next(&mut self, site: &SiteRecord) -> Result<Option<CheckOutcome>> {
        match self.frontier.next_page(&self.storage, site)? {
            Some(page) => self.check_page(site, page.id).await.map(Some),
            None => Ok(None),
        }
    }

    /// Checks up to `num` pages of a site, one after another.
    pub async fn check_site(&mut self, site: &SiteRecord, num: usize) -> Result<Vec<CheckOutcome>> {
        let mut outcomes = Vec::with_capacity(num);
        for _ in 0..num {
            match self.check_next(site).await? {
                Some(outcome) => outcomes.push(outcome),
                None => break,
            }
        }
        Ok(outcomes)
    }

    /// Runs the full check cycle for one page.
    pub async fn check_page(&mut self, site: &SiteRecord, page_id: i64) -> Result<CheckOutcome> {
        let mut page = self.storage.get_page(page_id)?;
        let url = page.full_url(site);
        let started = Instant::now();

        page.is_checked = true;
        page.checked_at = Some(Utc::now());

        tracing::debug!("Checking page {} ({})", page.id, url);

        let meta = match head_url(&self.client, &url).await {
            Ok(meta) => meta,
            Err(failure) => {
                tracing::warn!("Validation failed for {}: {}", url, failure.message);
                page.status = failure.status;
                page.error_message = failure.message.clone();
                page.check_time = started.elapsed().as_secs_f64();
                self.storage.save_page(&page)?;
                return Ok(CheckOutcome::ValidationFailed {
                    url,
                    status: failure.status,
                    message: failure.message,
                });
            }
        };

        page.status = meta.status;
        page.content_type = meta.content_type.clone();
        page.size_bytes = meta.content_length;
        page.error_message.clear();
        // Commit the validation result before any content processing.
        self.storage.save_page(&page)?;

        let is_local = Url::parse(&meta.final_url)
            .map(|final_url| site.is_local(&final_url))
            .unwrap_or(false);

        if !is_local {
            let links_dropped = self.storage.delete_outgoing_links(page.id)?;
            page.check_time = started.elapsed().as_secs_f64();
            self.storage.save_page(&page)?;
            tracing::info!(
                "Page {} now redirects off-site to {}; dropped {} links",
                page.id,
                meta.final_url,
                links_dropped
            );
            return Ok(CheckOutcome::OffSite {
                url,
                final_url: meta.final_url,
                links_dropped,
            });
        }

        if !meta.is_html() {
            page.check_time = started.elapsed().as_secs_f64();
            self.storage.save_page(&page)?;
            tracing::debug!("Page {} is {} ({}), not parsed", page.id, meta.status, meta.content_type);
            return Ok(CheckOutcome::NotHtml {
                url,
                content_type: meta.content_type,
            });
        }

        let (body_meta, body) = match get_url(&self.client, &url).await {
            Ok(fetched) => fetched,
            Err(failure) => {
                tracing::warn!("Body fetch failed for {}: {}", url, failure.message);
                page.status = failure.status;
                page.error_message = failure.message.clone();
                page.check_time = started.elapsed().as_secs_f64();
                self.storage.save_page(&page)?;
                return Ok(CheckOutcome::ValidationFailed {
                    url,
                    status: failure.status,
                    message: failure.message,
                });
            }
        };
        page.size_bytes = body_meta.content_length;

        if !is_valid_html(&body) {
            let message = format!("The URL {} should be HTML but does not look like it", url);
            tracing::warn!("{}", message);
            page.status = STATUS_UNEXPECTED_CONTENT;
            page.error_message = message.clone();
            page.check_time = started.elapsed().as_secs_f64();
            self.storage.save_page(&page)?;
            return Ok(CheckOutcome::UnexpectedContent { url, message });
        }

        let robots = self.robots.for_site(&self.client, site).await.clone();
        let diff = reconcile_links(&mut self.storage, site, &page, &robots, &body)?;

        // Plugins see the validator's headers: the page was classified as
        // HTML once, a divergent content-type on the body fetch must not
        // silently skip fact extraction.
        let plugin_outcome = run_plugins(&mut self.storage, &self.plugins, &page, &meta, &body)?;

        page.check_time = started.elapsed().as_secs_f64();
        self.storage.save_page(&page)?;

        tracing::info!(
            "Checked {} ({}): +{} / -{} links, {} values",
            url,
            page.status,
            diff.added.len(),
            diff.removed.len(),
            plugin_outcome.facts.len()
        );

        Ok(CheckOutcome::Processed {
            url,
            status: page.status,
            links_added: diff.added.len(),
            links_removed: diff.removed.len(),
            plugin_failures: plugin_outcome.failures,
        })
    }

    /// Deletes a page outright; storage rejects this while incoming edges
    /// still exist.
    pub fn delete_page(&mut self, page_id: i64) -> Result<()> {
        self.storage.delete_page(page_id)?;
        Ok(())
    }

    /// Marks a page due for recheck every `rotation_secs` seconds.
    pub fn schedule_page(&mut self, page_id: i64, rotation_secs: i64) -> Result<()> {
        self.storage.schedule_page(page_id, rotation_secs)?;
        Ok(())
    }

    pub fn unschedule_page(&mut self, page_id: i64) -> Result<()> {
        self.storage.unschedule_page(page_id)?;
        Ok(())
    }

    /// Resolves a page by its URL relative to the site, for CLI commands
    /// that take a path instead of an id.
    pub fn page_by_relative_url(&self, site: &SiteRecord, relative: &str) -> Result<Option<PageRecord>> {
        let absolute = Url::parse(&site.url(relative))?;
        let (subpath, params) = page_key(&absolute);
        Ok(self.storage.find_page(site.id, &subpath, &params)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::FixedDraw;
    use crate::config::Config;
    use crate::storage::SqliteStorage;

    fn test_checker() -> PageChecker<SqliteStorage, FixedDraw> {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let config = Config::default();
        let client = build_http_client(
            &config.user_agent.user_agent_string(),
            config.checker.request_timeout_secs,
        )
        .unwrap();
        PageChecker::with_parts(
            storage,
            client,
            PluginRegistry::with_builtins(),
            Frontier::with_draw(FixedDraw(1.0)),
        )
    }

    #[test]
    fn test_init_site_seeds_one_page() {
        let mut checker = test_checker();
        let site = checker.init_site("demo", "https://example.com/docs/").unwrap();

        assert_eq!(site.scheme, "https");
        assert_eq!(site.host, "example.com");
        assert_eq!(site.base_path, "/docs/");
        assert_eq!(checker.storage().count_pages(site.id).unwrap(), 1);

        let pages = checker.storage().unchecked_pages(site.id).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].subpath, "/docs/");
        assert_eq!(pages[0].status, STATUS_UNREACHABLE);
    }

    #[test]
    fn test_init_site_rejects_duplicate_name() {
        let mut checker = test_checker();
        checker.init_site("demo", "https://example.com/").unwrap();
        let err = checker.init_site("demo", "https://other.com/").unwrap_err();
        assert!(matches!(err, LinkwardError::SiteExists(_)));
    }

    #[test]
    fn test_reset_site_reseeds() {
        let mut checker = test_checker();
        let site = checker.init_site("demo", "https://example.com/").unwrap();
        checker
            .storage_mut()
            .create_page(site.id, "/extra", "", STATUS_UNREACHABLE)
            .unwrap();
        assert_eq!(checker.storage().count_pages(site.id).unwrap(), 2);

        checker.reset_site("demo").unwrap();
        assert_eq!(checker.storage().count_pages(site.id).unwrap(), 1);
        let pages = checker.storage().unchecked_pages(site.id).unwrap();
        assert_eq!(pages[0].subpath, "/");
    }

    #[test]
    fn test_reset_reseeds_same_page_as_init() {
        let mut checker = test_checker();
        let site = checker
            .init_site("demo", "https://example.com/docs/?lang=en")
            .unwrap();
        let seed = checker.storage().unchecked_pages(site.id).unwrap().remove(0);
        assert_eq!(seed.subpath, "/docs/");
        assert_eq!(seed.params, "");

        checker.reset_site("demo").unwrap();
        let reseeded = checker.storage().unchecked_pages(site.id).unwrap().remove(0);
        assert_eq!(reseeded.subpath, seed.subpath);
        assert_eq!(reseeded.params, seed.params);
    }

    #[test]
    fn test_reset_unknown_site() {
        let mut checker = test_checker();
        let err = checker.reset_site("ghost").unwrap_err();
        assert!(matches!(err, LinkwardError::SiteNotFound(_)));
    }

    #[test]
    fn test_progress_empty_site() {
        let mut checker = test_checker();
        let site = checker.init_site("demo", "https://example.com/").unwrap();
        let (checked, total, percent) = checker.progress(&site).unwrap();
        assert_eq!((checked, total), (0, 1));
        assert_eq!(percent, 0.0);
    }

    #[test]
    fn test_page_by_relative_url() {
        let mut checker = test_checker();
        let site = checker.init_site("demo", "https://example.com/").unwrap();
        checker
            .storage_mut()
            .create_page(site.id, "/list", "page=2", STATUS_UNREACHABLE)
            .unwrap();

        let found = checker
            .page_by_relative_url(&site, "/list?page=2")
            .unwrap()
            .unwrap();
        assert_eq!(found.subpath, "/list");
        assert!(checker.page_by_relative_url(&site, "/missing").unwrap().is_none());
    }
}
