//! Novel-Crawler: a serialized fiction aggregator
//!
//! This crate crawls novel listing sites described by declarative selector
//! sets, extracts novels and chapter indexes, and reconciles them against a
//! repository so that repeated crawls converge instead of duplicating.

pub mod config;
pub mod crawler;
pub mod output;
pub mod source;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Novel-Crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Unknown source '{0}'")]
    UnknownSource(String),

    #[error("Novel not found: {0}")]
    NovelNotFound(String),

    #[error("Source '{0}' defines no chapter content selector")]
    NoChapterSelectors(String),

    #[error("No chapter content found at {0}")]
    EmptyContent(String),

    #[error("A crawl cycle is already running")]
    CycleInProgress,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A page could not be retrieved
///
/// Covers non-success statuses, timeouts, connection failures and unreadable
/// bodies alike; callers only need to know which URL failed and why.
#[derive(Debug, Error)]
#[error("Failed to fetch {url}: {cause}")]
pub struct FetchError {
    pub url: String,
    pub cause: String,
}

/// A fetched body could not be treated as markup at all
#[derive(Debug, Error)]
#[error("Could not parse {url} as HTML: {message}")]
pub struct ParseError {
    pub url: String,
    pub message: String,
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

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector for source '{source_name}' ({field}): {message}")]
    InvalidSelector {
        source_name: String,
        field: &'static str,
        message: String,
    },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Novel-Crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

// Re-export commonly used types
pub use config::Config;
pub use source::{SourceDefinition, SourceRegistry};
pub use storage::{Chapter, Novel, NovelRepository};
pub use url::{canonicalize_url, resolve_link, slugify};
