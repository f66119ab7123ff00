//! Configuration loading and validation
//!
//! Linkward reads a TOML configuration file describing where the database
//! lives, how the checker identifies itself, and how checks are paced.

mod parser;
mod types;

pub use parser::load_config;
pub use types::{CheckerConfig, Config, StorageConfig, UserAgentConfig};
