//! Database schema definitions
//!
//! All uniqueness invariants of the data model live here as UNIQUE
//! constraints: one site per (scheme, host, base_path), one page per
//! (site, subpath, params), one edge per ordered page pair, one value
//! per (page, name), at most one schedule per page.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Crawl targets
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    scheme TEXT NOT NULL,
    host TEXT NOT NULL,
    base_path TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(scheme, host, base_path)
);

-- Pages within a site
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    subpath TEXT NOT NULL DEFAULT '',
    params TEXT NOT NULL DEFAULT '',
    is_checked INTEGER NOT NULL DEFAULT 0,
    checked_at TEXT,
    check_time REAL NOT NULL DEFAULT 0.0,
    status INTEGER NOT NULL DEFAULT -1,
    content_type TEXT NOT NULL DEFAULT '',
    size_bytes INTEGER NOT NULL DEFAULT 0,
    error_message TEXT NOT NULL DEFAULT '',
    is_linkable INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    UNIQUE(site_id, subpath, params)
);

CREATE INDEX IF NOT EXISTS idx_pages_site ON pages(site_id);
CREATE INDEX IF NOT EXISTS idx_pages_checked ON pages(site_id, is_checked);
CREATE INDEX IF NOT EXISTS idx_pages_status ON pages(site_id, status);

-- Directed edges between pages
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    to_page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    UNIQUE(from_page_id, to_page_id)
);

CREATE INDEX IF NOT EXISTS idx_links_from ON links(from_page_id);
CREATE INDEX IF NOT EXISTS idx_links_to ON links(to_page_id);

-- Named facts produced by the plugin pipeline
CREATE TABLE IF NOT EXISTS page_values (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    value TEXT NOT NULL,
    UNIQUE(page_id, name)
);

CREATE INDEX IF NOT EXISTS idx_page_values_page ON page_values(page_id);
CREATE INDEX IF NOT EXISTS idx_page_values_name ON page_values(name);

-- Periodic recheck overrides
CREATE TABLE IF NOT EXISTS scheduled_pages (
    page_id INTEGER PRIMARY KEY REFERENCES pages(id) ON DELETE CASCADE,
    rotation_secs INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
