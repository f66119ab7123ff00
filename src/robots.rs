//! Robots.txt compliance checking
//!
//! A site's robots policy is fetched once per process, memoized for the
//! lifetime of the cache, and consulted before any discovered link is
//! admitted into the link graph. When the policy cannot be retrieved the
//! checker falls back to allowing everything.

use crate::model::SiteRecord;
use reqwest::Client;
use robotstxt::DefaultMatcher;
use std::collections::HashMap;

/// Generic user agent the compliance check is evaluated for.
pub const GENERIC_AGENT: &str = "*";

/// Parsed robots.txt policy for one site
#[derive(Debug, Clone)]
pub struct SiteRobots {
    /// Raw robots.txt content (empty means allow all)
    content: String,
    allow_all: bool,
}

impl SiteRobots {
    /// Creates a policy from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Creates a permissive policy that allows everything. Used when
    /// robots.txt cannot be fetched.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Checks if a path may be fetched by the given user agent
    pub fn can_fetch(&self, user_agent: &str, path: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, path)
    }
}

/// Per-site memoized robots policies, keyed by site id.
///
/// Read-only after population; invalidated only by process restart or an
/// explicit `refresh`.
#[derive(Default)]
pub struct RobotsCache {
    policies: HashMap<i64, SiteRobots>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the robots policy for a site, fetching it on first use.
    pub async fn for_site(&mut self, client: &Client, site: &SiteRecord) -> &SiteRobots {
        if !self.policies.contains_key(&site.id) {
            let policy = fetch_robots(client, site).await;
            self.policies.insert(site.id, policy);
        }
        // Populated just above when absent.
        self.policies.get(&site.id).unwrap()
    }

    /// Drops the memoized policy for a site so the next check re-fetches it.
    pub fn refresh(&mut self, site_id: i64) {
        self.policies.remove(&site_id);
    }

    /// Seeds the cache with a known policy (for tests and offline runs).
    pub fn preload(&mut self, site_id: i64, policy: SiteRobots) {
        self.policies.insert(site_id, policy);
    }
}

/// Fetches and parses a site's robots.txt, permissive on any failure.
async fn fetch_robots(client: &Client, site: &SiteRecord) -> SiteRobots {
    let url = site.url("/robots.txt");
    tracing::debug!("Fetching robots policy from {}", url);

    match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => match response.text().await {
            Ok(content) => SiteRobots::from_content(&content),
            Err(e) => {
                tracing::warn!("Failed to read robots.txt body from {}: {}", url, e);
                SiteRobots::allow_all()
            }
        },
        Ok(response) => {
            tracing::debug!(
                "robots.txt at {} returned {}, allowing all",
                url,
                response.status()
            );
            SiteRobots::allow_all()
        }
        Err(e) => {
            tracing::warn!("Failed to fetch robots.txt from {}: {}", url, e);
            SiteRobots::allow_all()
        }
    }
}
