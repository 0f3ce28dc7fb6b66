//! Reconciliation of listing entries against the repository
//!
//! One listing entry is one unit of work:
//! 1. Fetch the detail page (the only network I/O of the unit)
//! 2. Extract detail fields and chapter stubs from that single document
//! 3. Create or update the novel, refreshing detail fields only when stale
//! 4. Create the chapters that are not stored yet
//!
//! Every write happens after the fetch, so a unit that fails or is cancelled
//! before step 3 leaves nothing behind.

use crate::crawler::extractor::{
    extract_chapter_stubs, extract_detail, parse_document, ChapterStub, DetailFields,
    ListingEntry,
};
use crate::crawler::Fetcher;
use crate::source::CompiledSource;
use crate::storage::{Chapter, Novel, NovelRepository, StorageError};
use crate::url::slugify;
use crate::{CrawlError, ParseError};
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

/// Slug candidates tried before giving up on a title collision
const MAX_SLUG_ATTEMPTS: u32 = 5;

/// What reconciling one listing entry did
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// The novel as stored after the unit
    pub novel: Novel,
    /// The source URL had never been seen before
    pub created: bool,
    /// Detail fields were re-extracted
    pub details_refreshed: bool,
    pub chapters_created: u64,
}

/// Everything read from a detail page
#[derive(Debug)]
struct DetailPage {
    fields: DetailFields,
    stubs: Vec<ChapterStub>,
}

/// Merges extracted entries into a shared repository
pub struct Reconciler<R> {
    repository: Arc<Mutex<R>>,
    fetcher: Fetcher,
    staleness: Duration,
}

impl<R: NovelRepository> Reconciler<R> {
    /// Creates a reconciler
    ///
    /// # Arguments
    ///
    /// * `repository` - Shared repository; the lock is never held across an await
    /// * `fetcher` - Fetcher used for detail pages
    /// * `staleness` - Age after which detail fields are re-extracted
    pub fn new(repository: Arc<Mutex<R>>, fetcher: Fetcher, staleness: Duration) -> Self {
        Self {
            repository,
            fetcher,
            staleness,
        }
    }

    /// Reconciles one listing entry of `source`
    pub async fn reconcile_entry(
        &self,
        source: &CompiledSource,
        entry: &ListingEntry,
    ) -> Result<ReconcileOutcome, CrawlError> {
        let body = self.fetcher.fetch(entry.url.as_str()).await?;
        let page = read_detail_page(source, &entry.url, &body)?;

        self.apply(source, entry, page)
    }

    fn apply(
        &self,
        source: &CompiledSource,
        entry: &ListingEntry,
        page: DetailPage,
    ) -> Result<ReconcileOutcome, CrawlError> {
        let now = Utc::now();
        let mut repository = lock_repository(&self.repository)?;

        let existing = repository.find_novel_by_source_url(entry.url.as_str())?;
        let is_new = existing.is_none();

        let mut novel = match existing {
            Some(novel) => novel,
            None => Novel::new(
                entry.title.clone(),
                base_slug(&entry.title),
                source.name.clone(),
                entry.url.to_string(),
                now,
            ),
        };

        if novel.author.is_none() {
            novel.author = entry.author.clone();
        }
        if novel.cover_url.is_none() {
            novel.cover_url = entry.cover_url.clone();
        }

        let details_refreshed = needs_detail_refresh(&novel, now, self.staleness);
        if details_refreshed {
            let DetailFields {
                description,
                genres,
                status,
                rating,
            } = page.fields;
            novel.description = description;
            novel.genres = genres;
            novel.status = status;
            novel.rating = rating;
        }

        novel.last_updated = now;
        novel.chapter_count = u32::try_from(page.stubs.len()).unwrap_or(u32::MAX);

        let (novel, adopted) = persist_novel(&mut *repository, novel)?;
        let created = is_new && !adopted;
        let novel_id = novel
            .id
            .ok_or_else(|| StorageError::UnsavedNovel(novel.source_url.clone()))?;

        let chapters_created = create_missing_chapters(&mut *repository, novel_id, &page.stubs)?;

        tracing::debug!(
            source = %source.name,
            url = %entry.url,
            created,
            details_refreshed,
            chapters_created,
            "Reconciled novel"
        );

        Ok(ReconcileOutcome {
            novel,
            created,
            details_refreshed,
            chapters_created,
        })
    }
}

/// Locks a shared repository, mapping poisoning to a storage error
pub(crate) fn lock_repository<R>(
    repository: &Mutex<R>,
) -> Result<MutexGuard<'_, R>, StorageError> {
    repository
        .lock()
        .map_err(|_| StorageError::Database("repository lock poisoned".to_string()))
}

/// Whether a novel's detail fields are due for re-extraction
///
/// Uses the novel's `last_updated` as stored before this pass.
pub fn needs_detail_refresh(novel: &Novel, now: DateTime<Utc>, staleness: Duration) -> bool {
    let missing = novel
        .description
        .as_deref()
        .map_or(true, |d| d.trim().is_empty());

    missing || now - novel.last_updated > staleness
}

/// Number of the `index`-th stub (0-based) of a newest-first index of `total` stubs
pub fn chapter_number(total: usize, index: usize) -> u32 {
    u32::try_from(total.saturating_sub(index)).unwrap_or(u32::MAX)
}

fn base_slug(title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        "novel".to_string()
    } else {
        slug
    }
}

/// Parses a detail page; chapter links resolve against the page's own URL
fn read_detail_page(
    source: &CompiledSource,
    url: &Url,
    body: &str,
) -> Result<DetailPage, ParseError> {
    let document = parse_document(url.as_str(), body)?;

    Ok(DetailPage {
        fields: extract_detail(&document, &source.detail),
        stubs: extract_chapter_stubs(&document, &source.detail, url),
    })
}

/// Upserts a novel, resolving unique-key conflicts
///
/// A conflict on a novel whose source URL is now stored means another writer
/// got there first: the stored id and slug are adopted and the upsert is
/// retried. Otherwise the slug is taken by a different novel and the next
/// numbered slug is tried.
///
/// Returns the stored novel and whether another writer's row was adopted.
fn persist_novel<R: NovelRepository + ?Sized>(
    repository: &mut R,
    mut novel: Novel,
) -> Result<(Novel, bool), CrawlError> {
    let base = novel.slug.clone();
    let mut suffix = 1;
    let mut adopted = false;

    for _ in 0..MAX_SLUG_ATTEMPTS {
        match repository.upsert_novel(&novel) {
            Ok(stored) => return Ok((stored, adopted)),
            Err(StorageError::PersistenceConflict(message)) => {
                if let Some(stored) = repository.find_novel_by_source_url(&novel.source_url)? {
                    tracing::debug!(url = %novel.source_url, "Novel stored concurrently, retrying as update");
                    adopted = true;
                    novel.id = stored.id;
                    novel.slug = stored.slug;
                } else {
                    suffix += 1;
                    tracing::debug!(slug = %novel.slug, %message, "Slug taken, trying suffix {}", suffix);
                    novel.slug = format!("{}-{}", base, suffix);
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(StorageError::PersistenceConflict(format!(
        "no free slug for '{}' after {} attempts",
        novel.source_url, MAX_SLUG_ATTEMPTS
    ))
    .into())
}

/// Creates the chapters of `stubs` not stored yet and returns how many were created
fn create_missing_chapters<R: NovelRepository + ?Sized>(
    repository: &mut R,
    novel_id: i64,
    stubs: &[ChapterStub],
) -> Result<u64, CrawlError> {
    let total = stubs.len();
    let mut created = 0;

    for (index, stub) in stubs.iter().enumerate() {
        let number = chapter_number(total, index);

        if repository.find_chapter(novel_id, number)?.is_some() {
            continue;
        }

        let title = if stub.title.is_empty() {
            format!("Chapter {}", number)
        } else {
            stub.title.clone()
        };

        let chapter = Chapter {
            id: None,
            novel_id,
            title,
            number,
            url: stub.url.to_string(),
            content: String::new(),
            published_at: stub.published_at,
            prev_chapter: None,
            next_chapter: None,
        };

        match repository.create_chapter(&chapter) {
            Ok(_) => created += 1,
            Err(StorageError::PersistenceConflict(_)) => {
                tracing::debug!(novel_id, number, "Chapter created concurrently");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(created)
}
