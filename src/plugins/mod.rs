//! Plugin extraction pipeline
//!
//! Plugins are pure functions that look at a fetched page and emit named
//! string facts ("values"). After every successful check of a local HTML
//! page, the whole registry runs; a failing plugin is recorded and skipped
//! without aborting the pipeline. The merged output then reconciles the
//! page's stored values: names no plugin produced any more are deleted,
//! everything else is upserted.

mod builtin;

pub use builtin::{get_title, get_version};

use crate::checker::ResponseMeta;
use crate::model::PageRecord;
use crate::storage::{Storage, StorageError};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// A plugin's own failure, isolated from the rest of the pipeline
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PluginError(pub String);

/// Facts produced by one plugin run
pub type PluginFacts = BTreeMap<String, String>;

/// A registered plugin: page record, response metadata and body in,
/// named facts out.
pub type PluginFn = fn(&PageRecord, &ResponseMeta, &str) -> Result<PluginFacts, PluginError>;

/// Named set of plugins, run in name order.
pub struct PluginRegistry {
    plugins: BTreeMap<String, PluginFn>,
}

impl PluginRegistry {
    /// An empty registry; the pipeline becomes a no-op beyond deleting
    /// previously stored values.
    pub fn empty() -> Self {
        Self {
            plugins: BTreeMap::new(),
        }
    }

    /// The registry with the built-in plugins registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("get_title", get_title);
        registry.register("get_version", get_version);
        registry
    }

    /// Registers a plugin under a name, replacing any previous registration.
    pub fn register(&mut self, name: &str, plugin: PluginFn) {
        self.plugins.insert(name.to_string(), plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PluginFn)> {
        self.plugins.iter().map(|(name, f)| (name.as_str(), f))
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// What one pipeline run did to a page's values
#[derive(Debug, Default)]
pub struct PluginOutcome {
    /// Merged facts after the run (also what is now persisted)
    pub facts: PluginFacts,
    /// One "name: message" entry per failed plugin
    pub failures: Vec<String>,
    /// Stored values deleted because no plugin produces them any more
    pub deleted: usize,
}

impl PluginOutcome {
    pub fn all_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs every registered plugin against a page and reconciles its stored
/// values with the merged output.
///
/// Plugins run in name order; when two emit the same fact name the later
/// one wins. A plugin failure is collected, not propagated, so a single
/// broken plugin cannot block the others or the reconciliation.
pub fn run_plugins<S: Storage>(
    storage: &mut S,
    registry: &PluginRegistry,
    page: &PageRecord,
    meta: &ResponseMeta,
    body: &str,
) -> Result<PluginOutcome, StorageError> {
    let mut outcome = PluginOutcome::default();

    for (name, plugin) in registry.iter() {
        match plugin(page, meta, body) {
            Ok(facts) => outcome.facts.extend(facts),
            Err(e) => {
                tracing::warn!("Plugin {} failed on page {}: {}", name, page.id, e);
                outcome.failures.push(format!("{}: {}", name, e));
            }
        }
    }

    let produced: BTreeSet<&str> = outcome.facts.keys().map(String::as_str).collect();
    let stale: Vec<String> = storage
        .value_names(page.id)?
        .into_iter()
        .filter(|name| !produced.contains(name.as_str()))
        .collect();
    if !stale.is_empty() {
        outcome.deleted = storage.delete_values_by_names(page.id, &stale)?;
    }

    for (name, value) in &outcome.facts {
        storage.upsert_value(page.id, name, value)?;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::STATUS_UNREACHABLE;
    use crate::storage::SqliteStorage;

    fn html_meta() -> ResponseMeta {
        ResponseMeta {
            status: 200,
            content_type: "text/html".to_string(),
            content_length: 0,
            final_url: "https://example.com/".to_string(),
        }
    }

    fn setup() -> (SqliteStorage, PageRecord) {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let site = storage
            .create_site("demo", "https", "example.com", "/")
            .unwrap();
        let page = storage
            .create_page(site.id, "/", "", STATUS_UNREACHABLE)
            .unwrap();
        (storage, page)
    }

    fn emit_kind(_: &PageRecord, _: &ResponseMeta, _: &str) -> Result<PluginFacts, PluginError> {
        let mut facts = PluginFacts::new();
        facts.insert("kind".to_string(), "demo".to_string());
        Ok(facts)
    }

    fn always_fails(_: &PageRecord, _: &ResponseMeta, _: &str) -> Result<PluginFacts, PluginError> {
        Err(PluginError("no parser for this body".to_string()))
    }

    #[test]
    fn test_builtins_registered() {
        let registry = PluginRegistry::with_builtins();
        assert_eq!(registry.len(), 2);
        let names: Vec<&str> = registry.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["get_title", "get_version"]);
    }

    #[test]
    fn test_run_persists_facts() {
        let (mut storage, page) = setup();
        let mut registry = PluginRegistry::empty();
        registry.register("emit_kind", emit_kind);

        let outcome =
            run_plugins(&mut storage, &registry, &page, &html_meta(), "<html></html>").unwrap();

        assert!(outcome.all_ok());
        assert_eq!(
            storage.get_value(page.id, "kind").unwrap().as_deref(),
            Some("demo")
        );
    }

    #[test]
    fn test_failure_is_isolated() {
        let (mut storage, page) = setup();
        let mut registry = PluginRegistry::empty();
        registry.register("broken", always_fails);
        registry.register("emit_kind", emit_kind);

        let outcome =
            run_plugins(&mut storage, &registry, &page, &html_meta(), "<html></html>").unwrap();

        // The broken plugin is reported, the healthy one still persisted.
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].starts_with("broken: "));
        assert_eq!(
            storage.get_value(page.id, "kind").unwrap().as_deref(),
            Some("demo")
        );
    }

    #[test]
    fn test_stale_values_deleted() {
        let (mut storage, page) = setup();
        storage.upsert_value(page.id, "obsolete", "x").unwrap();
        storage.upsert_value(page.id, "kind", "old").unwrap();

        let mut registry = PluginRegistry::empty();
        registry.register("emit_kind", emit_kind);
        let outcome =
            run_plugins(&mut storage, &registry, &page, &html_meta(), "<html></html>").unwrap();

        assert_eq!(outcome.deleted, 1);
        assert!(storage.get_value(page.id, "obsolete").unwrap().is_none());
        assert_eq!(
            storage.get_value(page.id, "kind").unwrap().as_deref(),
            Some("demo")
        );
    }

    #[test]
    fn test_empty_registry_clears_values()  {
        let (mut storage, page) = setup();
        storage.upsert_value(page.id, "kind", "old").unwrap();

        let registry = PluginRegistry::empty();
        let outcome =
            run_plugins(&mut storage, &registry, &page, &html_meta(), "<html></html>").unwrap();

        assert_eq!(outcome.deleted, 1);
        assert!(storage.values_for_page(page.id).unwrap().is_empty());
    }
}
