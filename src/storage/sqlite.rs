//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the NovelRepository trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{NovelRepository, StorageError, StorageResult};
use crate::storage::{Chapter, Novel, RunCounts, RunRecord, RunStatus};
use crate::CrawlError;
use chrono::Utc;
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;

const NOVEL_COLUMNS: &str = "id, title, author, description, cover_url, status, rating,
     chapter_count, slug, source, source_url, last_updated";

/// Chapter columns plus the ids of the neighbouring chapters by number
const CHAPTER_COLUMNS: &str = "c.id, c.novel_id, c.title, c.number, c.url, c.content, c.published_at,
     (SELECT p.id FROM chapters p WHERE p.novel_id = c.novel_id AND p.number < c.number
      ORDER BY p.number DESC LIMIT 1),
     (SELECT n.id FROM chapters n WHERE n.novel_id = c.novel_id AND n.number > c.number
      ORDER BY n.number ASC LIMIT 1)";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(CrawlError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, CrawlError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, CrawlError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn load_genres(&self, novel_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT genre FROM novel_genres WHERE novel_id = ?1 ORDER BY position")?;

        let genres = stmt
            .query_map(params![novel_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(genres)
    }

    fn with_genres(&self, mut novel: Novel) -> StorageResult<Novel> {
        if let Some(id) = novel.id {
            novel.genres = self.load_genres(id)?;
        }
        Ok(novel)
    }

    fn query_one_novel(&self, filter: &str, value: &str) -> StorageResult<Option<Novel>> {
        let sql = format!("SELECT {} FROM novels WHERE {} = ?1", NOVEL_COLUMNS, filter);
        let novel = self
            .conn
            .query_row(&sql, params![value], novel_from_row)
            .optional()?;

        novel.map(|n| self.with_genres(n)).transpose()
    }
}

fn novel_from_row(row: &Row<'_>) -> rusqlite::Result<Novel> {
    Ok(Novel {
        id: Some(row.get(0)?),
        title: row.get(1)?,
        author: row.get(2)?,
        description: row.get(3)?,
        cover_url: row.get(4)?,
        genres: Vec::new(),
        status: row.get(5)?,
        rating: row.get(6)?,
        chapter_count: row.get(7)?,
        slug: row.get(8)?,
        source: row.get(9)?,
        source_url: row.get(10)?,
        last_updated: row.get(11)?,
    })
}

fn chapter_from_row(row: &Row<'_>) -> rusqlite::Result<Chapter> {
    Ok(Chapter {
        id: Some(row.get(0)?),
        novel_id: row.get(1)?,
        title: row.get(2)?,
        number: row.get(3)?,
        url: row.get(4)?,
        content: row.get(5)?,
        published_at: row.get(6)?,
        prev_chapter: row.get(7)?,
        next_chapter: row.get(8)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Interrupted),
        counts: RunCounts {
            novels_processed: row.get::<_, i64>(5)? as u64,
            novels_failed: row.get::<_, i64>(6)? as u64,
            chapters_created: row.get::<_, i64>(7)? as u64,
        },
    })
}

/// Maps unique-key violations to `PersistenceConflict`
///
/// Other constraint failures (foreign key, NOT NULL, CHECK) stay plain
/// SQLite errors.
fn map_write_error(err: rusqlite::Error) -> StorageError {
    match &err {
        rusqlite::Error::SqliteFailure(e, message) if is_unique_violation(e) => {
            StorageError::PersistenceConflict(
                message.clone().unwrap_or_else(|| e.to_string()),
            )
        }
        _ => StorageError::Sqlite(err),
    }
}

fn is_unique_violation(error: &ffi::Error) -> bool {
    error.code == ErrorCode::ConstraintViolation
        && matches!(
            error.extended_code,
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        )
}

impl NovelRepository for SqliteStorage {
    // ===== Crawl pipeline =====

    fn find_novel_by_source_url(&self, source_url: &str) -> StorageResult<Option<Novel>> {
        self.query_one_novel("source_url", source_url)
    }

    fn upsert_novel(&mut self, novel: &Novel) -> StorageResult<Novel> {
        let now = Utc::now();
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO novels (title, author, description, cover_url, status, rating,
             chapter_count, slug, source, source_url, last_updated, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(source_url) DO UPDATE SET
                title = excluded.title,
                author = excluded.author,
                description = excluded.description,
                cover_url = excluded.cover_url,
                status = excluded.status,
                rating = excluded.rating,
                chapter_count = excluded.chapter_count,
                last_updated = excluded.last_updated",
            params![
                novel.title,
                novel.author,
                novel.description,
                novel.cover_url,
                novel.status,
                novel.rating,
                novel.chapter_count,
                novel.slug,
                novel.source,
                novel.source_url,
                novel.last_updated,
                now,
            ],
        )
        .map_err(map_write_error)?;

        let id: i64 = tx.query_row(
            "SELECT id FROM novels WHERE source_url = ?1",
            params![novel.source_url],
            |row| row.get(0),
        )?;

        tx.execute("DELETE FROM novel_genres WHERE novel_id = ?1", params![id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO novel_genres (novel_id, position, genre) VALUES (?1, ?2, ?3)",
            )?;
            for (position, genre) in novel.genres.iter().enumerate() {
                stmt.execute(params![id, position as i64, genre])?;
            }
        }

        tx.commit()?;

        self.find_novel_by_source_url(&novel.source_url)?
            .ok_or_else(|| StorageError::UnsavedNovel(novel.source_url.clone()))
    }

    fn find_chapter(&self, novel_id: i64, number: u32) -> StorageResult<Option<Chapter>> {
        let sql = format!(
            "SELECT {} FROM chapters c WHERE c.novel_id = ?1 AND c.number = ?2",
            CHAPTER_COLUMNS
        );

        let chapter = self
            .conn
            .query_row(&sql, params![novel_id, number], chapter_from_row)
            .optional()?;

        Ok(chapter)
    }

    fn create_chapter(&mut self, chapter: &Chapter) -> StorageResult<Chapter> {
        self.conn
            .execute(
                "INSERT INTO chapters (novel_id, title, number, url, content, published_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    chapter.novel_id,
                    chapter.title,
                    chapter.number,
                    chapter.url,
                    chapter.content,
                    chapter.published_at,
                    Utc::now(),
                ],
            )
            .map_err(map_write_error)?;

        Ok(Chapter {
            id: Some(self.conn.last_insert_rowid()),
            ..chapter.clone()
        })
    }

    // ===== Read queries =====

    fn find_novel_by_slug(&self, slug: &str) -> StorageResult<Option<Novel>> {
        self.query_one_novel("slug", slug)
    }

    fn list_novels(&self, page: u32, per_page: u32) -> StorageResult<Vec<Novel>> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(per_page);
        let sql = format!(
            "SELECT {} FROM novels ORDER BY last_updated DESC, id DESC LIMIT ?1 OFFSET ?2",
            NOVEL_COLUMNS
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let novels = stmt
            .query_map(params![per_page, offset], novel_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        novels.into_iter().map(|n| self.with_genres(n)).collect()
    }

    fn list_chapters(&self, novel_id: i64) -> StorageResult<Vec<Chapter>> {
        let sql = format!(
            "SELECT {} FROM chapters c WHERE c.novel_id = ?1 ORDER BY c.number ASC",
            CHAPTER_COLUMNS
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let chapters = stmt
            .query_map(params![novel_id], chapter_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(chapters)
    }

    fn set_chapter_content(&mut self, chapter_id: i64, content: &str) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE chapters SET content = ?1 WHERE id = ?2",
            params![content, chapter_id],
        )?;

        if updated == 0 {
            return Err(StorageError::ChapterNotFound(chapter_id));
        }
        Ok(())
    }

    // ===== Run ledger =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![Utc::now(), config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn complete_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counts: RunCounts,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, novels_processed = ?3,
             novels_failed = ?4, chapters_created = ?5 WHERE id = ?6",
            params![
                status.to_db_string(),
                Utc::now(),
                counts.novels_processed as i64,
                counts.novels_failed as i64,
                counts.chapters_created as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status,
                 novels_processed, novels_failed, chapters_created
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    // ===== Statistics =====

    fn count_novels(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM novels", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_chapters(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chapters", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_chapters_without_content(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM chapters WHERE content = ''",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_novels_by_source(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source, COUNT(*) FROM novels GROUP BY source ORDER BY source")?;

        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }
}
