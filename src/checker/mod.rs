//! Page checking core
//!
//! This module contains the checking logic:
//! - Frontier scheduling (which page to check next)
//! - Lightweight validation and full-body fetching
//! - Incremental link-graph reconciliation
//! - Overall check orchestration
//!
//! Checks run strictly sequentially per site: one page is fully checked
//! before the next one is selected. The caller is expected to pause between
//! checks (around two seconds) to stay polite; the core never sleeps.

mod coordinator;
mod frontier;
mod http;
mod links;

pub use coordinator::{CheckOutcome, PageChecker};
pub use frontier::{Draw, FixedDraw, Frontier, ThreadDraw, ERROR_RETRY_PROBABILITY};
pub use http::{build_http_client, head_url, get_url, Failure, ResponseMeta};
pub use links::{reconcile_links, LinkDiff};
