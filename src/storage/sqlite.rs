//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::model::{PageRecord, ScheduledPageRecord, SiteRecord, ValueRecord};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::LinkwardError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

/// Serializes a timestamp for storage. A fixed fractional width keeps the
/// stored text lexicographically ordered by instant.
fn ts_to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts_from_db(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn opt_ts_from_db(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| ts_from_db(idx, s)).transpose()
}

fn site_from_row(row: &Row) -> rusqlite::Result<SiteRecord> {
    Ok(SiteRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        scheme: row.get(2)?,
        host: row.get(3)?,
        base_path: row.get(4)?,
        created_at: ts_from_db(5, row.get(5)?)?,
    })
}

fn page_from_row(row: &Row) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        site_id: row.get(1)?,
        subpath: row.get(2)?,
        params: row.get(3)?,
        is_checked: row.get(4)?,
        checked_at: opt_ts_from_db(5, row.get(5)?)?,
        check_time: row.get(6)?,
        status: row.get(7)?,
        content_type: row.get(8)?,
        size_bytes: row.get(9)?,
        error_message: row.get(10)?,
        is_linkable: row.get(11)?,
        created_at: ts_from_db(12, row.get(12)?)?,
    })
}

const PAGE_COLUMNS: &str = "id, site_id, subpath, params, is_checked, checked_at, check_time, \
     status, content_type, size_bytes, error_message, is_linkable, created_at";

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, LinkwardError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (useful for tests and dry runs)
    pub fn new_in_memory() -> Result<Self, LinkwardError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn pages_where(&self, where_clause: &str, site_id: i64) -> StorageResult<Vec<PageRecord>> {
        let sql = format!("SELECT {} FROM pages WHERE {}", PAGE_COLUMNS, where_clause);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![site_id], page_from_row)?;
        let mut pages = Vec::new();
        for row in rows {
            pages.push(row?);
        }
        Ok(pages)
    }
}

impl Storage for SqliteStorage {
    // ===== Site Management =====

    fn create_site(
        &mut self,
        name: &str,
        scheme: &str,
        host: &str,
        base_path: &str,
    ) -> StorageResult<SiteRecord> {
        let now = ts_to_db(Utc::now());
        self.conn
            .execute(
                "INSERT INTO sites (name, scheme, host, base_path, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![name, scheme, host, base_path, now],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StorageError::ConstraintViolation(format!(
                        "site {} ({}://{}{}) already exists",
                        name, scheme, host, base_path
                    ))
                } else {
                    StorageError::Sqlite(e)
                }
            })?;

        self.get_site(self.conn.last_insert_rowid())
    }

    fn get_site(&self, site_id: i64) -> StorageResult<SiteRecord> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, scheme, host, base_path, created_at FROM sites WHERE id = ?1",
        )?;
        stmt.query_row(params![site_id], site_from_row)
            .optional()?
            .ok_or(StorageError::SiteNotFound(site_id))
    }

    fn get_site_by_name(&self, name: &str) -> StorageResult<Option<SiteRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, scheme, host, base_path, created_at FROM sites WHERE name = ?1",
        )?;
        Ok(stmt.query_row(params![name], site_from_row).optional()?)
    }

    fn list_sites(&self) -> StorageResult<Vec<SiteRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, scheme, host, base_path, created_at FROM sites ORDER BY name",
        )?;
        let rows = stmt.query_map([], site_from_row)?;
        let mut sites = Vec::new();
        for row in rows {
            sites.push(row?);
        }
        Ok(sites)
    }

    fn delete_site_pages(&mut self, site_id: i64) -> StorageResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM pages WHERE site_id = ?1", params![site_id])?;
        Ok(removed)
    }

    // ===== Page Management =====

    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord> {
        let sql = format!("SELECT {} FROM pages WHERE id = ?1", PAGE_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        stmt.query_row(params![page_id], page_from_row)
            .optional()?
            .ok_or(StorageError::PageNotFound(page_id))
    }

    fn find_page(
        &self,
        site_id: i64,
        subpath: &str,
        params_: &str,
    ) -> StorageResult<Option<PageRecord>> {
        let sql = format!(
            "SELECT {} FROM pages WHERE site_id = ?1 AND subpath = ?2 AND params = ?3",
            PAGE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        Ok(stmt
            .query_row(params![site_id, subpath, params_], page_from_row)
            .optional()?)
    }

    fn create_page(
        &mut self,
        site_id: i64,
        subpath: &str,
        params_: &str,
        status: i32,
    ) -> StorageResult<PageRecord> {
        let now = ts_to_db(Utc::now());
        self.conn
            .execute(
                "INSERT INTO pages (site_id, subpath, params, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![site_id, subpath, params_, status, now],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StorageError::ConstraintViolation(format!(
                        "page ({}, {}) already exists for site {}",
                        subpath, params_, site_id
                    ))
                } else {
                    StorageError::Sqlite(e)
                }
            })?;

        self.get_page(self.conn.last_insert_rowid())
    }

    fn load_or_create_page(
        &mut self,
        site_id: i64,
        subpath: &str,
        params_: &str,
    ) -> StorageResult<(PageRecord, bool)> {
        if let Some(page) = self.find_page(site_id, subpath, params_)? {
            return Ok((page, false));
        }
        let page = self.create_page(site_id, subpath, params_, crate::model::STATUS_UNREACHABLE)?;
        Ok((page, true))
    }

    fn save_page(&mut self, page: &PageRecord) -> StorageResult<()> {
        let checked_at = page.checked_at.map(ts_to_db);
        let changed = self.conn.execute(
            "UPDATE pages SET is_checked = ?1, checked_at = ?2, check_time = ?3,
             status = ?4, content_type = ?5, size_bytes = ?6, error_message = ?7,
             is_linkable = ?8 WHERE id = ?9",
            params![
                page.is_checked,
                checked_at,
                page.check_time,
                page.status,
                page.content_type,
                page.size_bytes,
                page.error_message,
                page.is_linkable,
                page.id
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::PageNotFound(page.id));
        }
        Ok(())
    }

    fn delete_page(&mut self, page_id: i64) -> StorageResult<()> {
        if self.incoming_link_count(page_id)? > 0 {
            return Err(StorageError::ConstraintViolation(format!(
                "page {} still has incoming links",
                page_id
            )));
        }
        let removed = self
            .conn
            .execute("DELETE FROM pages WHERE id = ?1", params![page_id])?;
        if removed == 0 {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(())
    }

    fn unchecked_pages(&self, site_id: i64) -> StorageResult<Vec<PageRecord>> {
        self.pages_where(
            "site_id = ?1 AND is_checked = 0 ORDER BY created_at ASC, id ASC",
            site_id,
        )
    }

    fn checked_pages(&self, site_id: i64) -> StorageResult<Vec<PageRecord>> {
        self.pages_where(
            "site_id = ?1 AND is_checked = 1 ORDER BY checked_at ASC, id ASC",
            site_id,
        )
    }

    fn error_pages(&self, site_id: i64) -> StorageResult<Vec<PageRecord>> {
        self.pages_where(
            "site_id = ?1 AND is_checked = 1 AND (status < 200 OR status > 299)
             ORDER BY checked_at ASC, id ASC",
            site_id,
        )
    }

    fn count_pages(&self, site_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE site_id = ?1",
            params![site_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_checked_pages(&self, site_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE site_id = ?1 AND is_checked = 1",
            params![site_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Link Management =====

    fn create_link_if_absent(
        &mut self,
        from_page_id: i64,
        to_page_id: i64,
    ) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO links (from_page_id, to_page_id) VALUES (?1, ?2)",
            params![from_page_id, to_page_id],
        )?;
        Ok(inserted > 0)
    }

    fn delete_link(&mut self, from_page_id: i64, to_page_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM links WHERE from_page_id = ?1 AND to_page_id = ?2",
            params![from_page_id, to_page_id],
        )?;
        Ok(())
    }

    fn delete_outgoing_links(&mut self, page_id: i64) -> StorageResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM links WHERE from_page_id = ?1",
            params![page_id],
        )?;
        Ok(removed)
    }

    fn outgoing_link_targets(&self, page_id: i64) -> StorageResult<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT to_page_id FROM links WHERE from_page_id = ?1 ORDER BY to_page_id")?;
        let rows = stmt.query_map(params![page_id], |row| row.get(0))?;
        let mut targets = Vec::new();
        for row in rows {
            targets.push(row?);
        }
        Ok(targets)
    }

    fn incoming_link_count(&self, page_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM links WHERE to_page_id = ?1",
            params![page_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_links(&self, site_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM links l JOIN pages p ON p.id = l.from_page_id
             WHERE p.site_id = ?1",
            params![site_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Value Management =====

    fn get_value(&self, page_id: i64, name: &str) -> StorageResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM page_values WHERE page_id = ?1 AND name = ?2",
                params![page_id, name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn upsert_value(&mut self, page_id: i64, name: &str, value: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO page_values (page_id, name, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(page_id, name) DO UPDATE SET value = excluded.value",
            params![page_id, name, value],
        )?;
        Ok(())
    }

    fn delete_values_by_names(&mut self, page_id: i64, names: &[String]) -> StorageResult<usize> {
        let mut removed = 0;
        for name in names {
            removed += self.conn.execute(
                "DELETE FROM page_values WHERE page_id = ?1 AND name = ?2",
                params![page_id, name],
            )?;
        }
        Ok(removed)
    }

    fn value_names(&self, page_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM page_values WHERE page_id = ?1 ORDER BY name")?;
        let rows = stmt.query_map(params![page_id], |row| row.get(0))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    fn values_for_page(&self, page_id: i64) -> StorageResult<Vec<ValueRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, page_id, name, value FROM page_values WHERE page_id = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map(params![page_id], |row| {
            Ok(ValueRecord {
                id: row.get(0)?,
                page_id: row.get(1)?,
                name: row.get(2)?,
                value: row.get(3)?,
            })
        })?;
        let mut values = Vec::new();
        for row in rows {
            values.push(row?);
        }
        Ok(values)
    }

    fn count_values(&self, site_id: i64, name: &str) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT v.value, COUNT(*) FROM page_values v
             JOIN pages p ON p.id = v.page_id
             WHERE p.site_id = ?1 AND v.name = ?2
             GROUP BY v.value ORDER BY v.value",
        )?;
        let rows = stmt.query_map(params![site_id, name], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;
        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }

    // ===== Scheduled Pages =====

    fn schedule_page(&mut self, page_id: i64, rotation_secs: i64) -> StorageResult<()> {
        // Reject scheduling a page that does not exist.
        self.get_page(page_id)?;
        let now = ts_to_db(Utc::now());
        self.conn.execute(
            "INSERT INTO scheduled_pages (page_id, rotation_secs, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(page_id) DO UPDATE SET rotation_secs = excluded.rotation_secs,
                 updated_at = excluded.updated_at",
            params![page_id, rotation_secs, now],
        )?;
        Ok(())
    }

    fn unschedule_page(&mut self, page_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM scheduled_pages WHERE page_id = ?1",
            params![page_id],
        )?;
        Ok(())
    }

    fn scheduled_pages(&self, site_id: i64) -> StorageResult<Vec<ScheduledPageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.page_id, s.rotation_secs, p.checked_at, s.created_at, s.updated_at
             FROM scheduled_pages s JOIN pages p ON p.id = s.page_id
             WHERE p.site_id = ?1 ORDER BY s.page_id",
        )?;
        let rows = stmt.query_map(params![site_id], |row| {
            Ok(ScheduledPageRecord {
                page_id: row.get(0)?,
                rotation_secs: row.get(1)?,
                checked_at: opt_ts_from_db(2, row.get(2)?)?,
                created_at: ts_from_db(3, row.get(3)?)?,
                updated_at: ts_from_db(4, row.get(4)?)?,
            })
        })?;
        let mut scheduled = Vec::new();
        for row in rows {
            scheduled.push(row?);
        }
        Ok(scheduled)
    }
}
