//! Crawler module: the ingestion pipeline
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching
//! - Selector-driven extraction of listings, details and chapter indexes
//! - Reconciliation of extracted entries against the repository
//! - Scheduled crawl cycles
//! - On-demand chapter content

mod content;
mod dates;
mod extractor;
mod fetcher;
mod reconciler;
mod scheduler;

pub use content::{ContentFetcher, FillReport};
pub use dates::{parse_chapter_date, parse_chapter_date_at};
pub use extractor::{
    extract_chapter_content, extract_chapter_stubs, extract_detail, extract_listing,
    parse_document, ChapterStub, DetailFields, ListingEntry,
};
pub use fetcher::{build_http_client, Fetcher};
pub use reconciler::{chapter_number, needs_detail_refresh, ReconcileOutcome, Reconciler};
pub use scheduler::{CycleReport, Scheduler};
