//! Incremental link-graph reconciliation
//!
//! After a page body is fetched, the candidate URLs found in it are
//! resolved against the page URL and filtered down to admissible local
//! destinations. The surviving destination set is diffed against the
//! page's stored outgoing edges: stale edges are deleted, new ones
//! created, untouched ones left alone. Destination pages themselves are
//! never deleted here; a page that lost its last incoming edge simply
//! stays in the frontier.

use crate::extract::extract_links;
use crate::model::{page_key, PageRecord, SiteRecord};
use crate::robots::{SiteRobots, GENERIC_AGENT};
use crate::storage::{Storage, StorageError};
use std::collections::BTreeSet;
use url::Url;

/// The edge changes one reconciliation produced
#[derive(Debug, Default)]
pub struct LinkDiff {
    pub removed: BTreeSet<i64>,
    pub added: BTreeSet<i64>,
}

/// Reconciles the outgoing edges of `page` with the links found in `body`.
///
/// Candidates that resolve off-site, back to the page itself, to a
/// robots-disallowed path, or to a non-linkable page are dropped. New
/// destination pages are created never-checked and thereby join the
/// frontier.
pub fn reconcile_links<S: Storage>(
    storage: &mut S,
    site: &SiteRecord,
    page: &PageRecord,
    robots: &SiteRobots,
    body: &str,
) -> Result<LinkDiff, StorageError> {
    let before: BTreeSet<i64> = storage.outgoing_link_targets(page.id)?.into_iter().collect();

    let page_url = match Url::parse(&page.full_url(site)) {
        Ok(url) => url,
        Err(e) => {
            return Err(StorageError::Database(format!(
                "Page {} has an unparseable URL: {}",
                page.id, e
            )))
        }
    };

    let mut after: BTreeSet<i64> = BTreeSet::new();
    for candidate in extract_links(body).in_order() {
        let mut resolved = match page_url.join(candidate) {
            Ok(url) => url,
            Err(_) => {
                tracing::debug!("Skipping unresolvable link '{}' on page {}", candidate, page.id);
                continue;
            }
        };
        resolved.set_fragment(None);

        if resolved == page_url {
            continue;
        }
        if !site.is_local(&resolved) {
            continue;
        }

        let (subpath, params) = page_key(&resolved);
        let relative = if params.is_empty() {
            subpath.clone()
        } else {
            format!("{}?{}", subpath, params)
        };
        if !robots.can_fetch(GENERIC_AGENT, &relative) {
            tracing::debug!("Robots policy excludes {} from the link graph", relative);
            continue;
        }

        let (destination, created) = storage.load_or_create_page(site.id, &subpath, &params)?;
        if created {
            tracing::info!("Discovered new page {} ({})", destination.id, relative);
        }
        if destination.id == page.id || !destination.is_linkable {
            continue;
        }

        if after.insert(destination.id) {
            storage.create_link_if_absent(page.id, destination.id)?;
        }
    }

    let mut diff = LinkDiff::default();
    for target in before.difference(&after) {
        storage.delete_link(page.id, *target)?;
        diff.removed.insert(*target);
    }
    diff.added = after.difference(&before).copied().collect();
    Ok(diff)
}
