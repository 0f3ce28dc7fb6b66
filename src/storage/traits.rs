//! Storage traits and error types
//!
//! This module defines the repository interface the crawl pipeline consumes
//! and the associated error types.

use crate::storage::{Chapter, Novel, RunCounts, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    /// A unique key (source URL, slug, or novel/number pair) is already taken
    #[error("Persistence conflict: {0}")]
    PersistenceConflict(String),

    #[error("Novel not persisted: {0}")]
    UnsavedNovel(String),

    #[error("Chapter not found: {0}")]
    ChapterNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Repository of novels and chapters
///
/// Implementations must enforce the uniqueness invariants themselves
/// (`source_url` and `slug` per novel, `(novel_id, number)` per chapter) and
/// report violations as [`StorageError::PersistenceConflict`]; the crawler
/// does not rely on in-process locking for them.
pub trait NovelRepository {
    // ===== Crawl pipeline =====

    /// Looks up a novel by its canonical source URL
    fn find_novel_by_source_url(&self, source_url: &str) -> StorageResult<Option<Novel>>;

    /// Inserts a novel or updates the one with the same source URL
    ///
    /// The stored slug of an existing novel is kept. Returns the stored
    /// novel with its id set.
    fn upsert_novel(&mut self, novel: &Novel) -> StorageResult<Novel>;

    /// Looks up a chapter by novel id and number
    fn find_chapter(&self, novel_id: i64, number: u32) -> StorageResult<Option<Chapter>>;

    /// Inserts a new chapter and returns it with its id set
    fn create_chapter(&mut self, chapter: &Chapter) -> StorageResult<Chapter>;

    // ===== Read queries =====

    /// Looks up a novel by slug
    fn find_novel_by_slug(&self, slug: &str) -> StorageResult<Option<Novel>>;

    /// Lists novels, most recently updated first
    ///
    /// `page` is 1-based.
    fn list_novels(&self, page: u32, per_page: u32) -> StorageResult<Vec<Novel>>;

    /// Lists a novel's chapters in reading order
    fn list_chapters(&self, novel_id: i64) -> StorageResult<Vec<Chapter>>;

    /// Stores the body of a chapter fetched on demand
    fn set_chapter_content(&mut self, chapter_id: i64, content: &str) -> StorageResult<()>;

    // ===== Run ledger =====

    /// Records the start of a crawl run and returns its id
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Records the end of a crawl run
    fn complete_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counts: RunCounts,
    ) -> StorageResult<()>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Statistics =====

    fn count_novels(&self) -> StorageResult<u64>;

    fn count_chapters(&self) -> StorageResult<u64>;

    /// Counts chapters whose content has not been fetched yet
    fn count_chapters_without_content(&self) -> StorageResult<u64>;

    /// Counts novels per source name, sorted by name
    fn count_novels_by_source(&self) -> StorageResult<Vec<(String, u64)>>;
}
