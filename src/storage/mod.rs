//! Storage module for persisting sites, pages, links, values and schedules
//!
//! The checker core only depends on the `Storage` trait; the crate ships a
//! SQLite implementation. All uniqueness invariants of the data model are
//! backed by UNIQUE constraints in the schema.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};
