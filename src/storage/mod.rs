//! Storage module for persisting novels and chapters
//!
//! The crawl pipeline only talks to the [`NovelRepository`] trait. This module
//! also ships the SQLite implementation used by the binary and the tests:
//! - Schema management
//! - Novel upserts keyed by source URL
//! - Chapter creation keyed by (novel, number)
//! - Read queries for the surrounding application
//! - A ledger of crawl runs

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{NovelRepository, StorageError, StorageResult};

use crate::CrawlError;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, CrawlError> {
    SqliteStorage::new(path)
}

/// A novel as stored in the repository
#[derive(Debug, Clone, PartialEq)]
pub struct Novel {
    /// Repository id; `None` until the novel has been persisted
    pub id: Option<i64>,
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub genres: Vec<String>,
    pub status: Option<String>,
    pub rating: Option<String>,
    pub chapter_count: u32,
    /// Derived from the title; unique, but not the identity key
    pub slug: String,
    /// Name of the source the novel was found through
    pub source: String,
    /// Canonical detail page URL; the identity key
    pub source_url: String,
    pub last_updated: DateTime<Utc>,
}

impl Novel {
    /// Creates a novel seen for the first time, with no detail fields yet
    pub fn new(
        title: String,
        slug: String,
        source: String,
        source_url: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            title,
            author: None,
            description: None,
            cover_url: None,
            genres: Vec::new(),
            status: None,
            rating: None,
            chapter_count: 0,
            slug,
            source,
            source_url,
            last_updated: now,
        }
    }
}

/// A chapter as stored in the repository
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    /// Repository id; `None` until the chapter has been persisted
    pub id: Option<i64>,
    pub novel_id: i64,
    pub title: String,
    /// 1-based position in reading order
    pub number: u32,
    pub url: String,
    /// Empty until filled by the on-demand content path
    pub content: String,
    pub published_at: DateTime<Utc>,
    /// Id of the chapter numbered just below this one, resolved on read
    pub prev_chapter: Option<i64>,
    /// Id of the chapter numbered just above this one, resolved on read
    pub next_chapter: Option<i64>,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config_hash: String,
    pub status: RunStatus,
    pub counts: RunCounts,
}

/// Tallies recorded for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub novels_processed: u64,
    pub novels_failed: u64,
    pub chapters_created: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}
