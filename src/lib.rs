//! Linkward: a polite, incremental site link-checker
//!
//! Given a seed URL, linkward discovers, fetches, validates, and re-checks
//! the pages belonging to one site, maintaining a link graph and per-page
//! metadata, and deciding page by page what to check next.

pub mod checker;
pub mod config;
pub mod extract;
pub mod model;
pub mod plugins;
pub mod robots;
pub mod storage;

use thiserror::Error;

/// Main error type for linkward operations
#[derive(Debug, Error)]
pub enum LinkwardError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Site already exists: {0}")]
    SiteExists(String),

    #[error("No such site: {0}")]
    SiteNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for linkward operations
pub type Result<T> = std::result::Result<T, LinkwardError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use checker::{CheckOutcome, PageChecker};
pub use config::Config;
pub use model::{PageRecord, SiteRecord};
pub use storage::{SqliteStorage, Storage};
