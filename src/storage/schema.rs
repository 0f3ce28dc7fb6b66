//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Novel-Crawler database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    novels_processed INTEGER NOT NULL DEFAULT 0,
    novels_failed INTEGER NOT NULL DEFAULT 0,
    chapters_created INTEGER NOT NULL DEFAULT 0
);

-- Novels, identified by their canonical source URL
CREATE TABLE IF NOT EXISTS novels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    author TEXT,
    description TEXT,
    cover_url TEXT,
    status TEXT,
    rating TEXT,
    chapter_count INTEGER NOT NULL DEFAULT 0,
    slug TEXT NOT NULL UNIQUE,
    source TEXT NOT NULL,
    source_url TEXT NOT NULL UNIQUE,
    last_updated TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_novels_last_updated ON novels(last_updated);

-- Genre tags, in the order the source lists them
CREATE TABLE IF NOT EXISTS novel_genres (
    novel_id INTEGER NOT NULL REFERENCES novels(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    genre TEXT NOT NULL,
    PRIMARY KEY (novel_id, position)
);

-- Chapters, identified by (novel_id, number)
CREATE TABLE IF NOT EXISTS chapters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    novel_id INTEGER NOT NULL REFERENCES novels(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    number INTEGER NOT NULL,
    url TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    published_at TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(novel_id, number)
);

CREATE INDEX IF NOT EXISTS idx_chapters_novel ON chapters(novel_id, number);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
