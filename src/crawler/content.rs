//! On-demand chapter content
//!
//! Crawl cycles only discover chapters; their bodies are fetched here, one
//! chapter at a time, when something asks for them.

use crate::crawler::extractor::{extract_chapter_content, parse_document};
use crate::crawler::reconciler::lock_repository;
use crate::crawler::Fetcher;
use crate::source::{CompiledChapterSelectors, SourceRegistry};
use crate::storage::{Chapter, Novel, NovelRepository, StorageError};
use crate::CrawlError;
use std::sync::{Arc, Mutex};

/// Result of filling every empty chapter of a novel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillReport {
    pub filled: u64,
    pub failed: u64,
}

/// Fetches and stores chapter bodies
pub struct ContentFetcher<R> {
    repository: Arc<Mutex<R>>,
    fetcher: Fetcher,
    registry: Arc<SourceRegistry>,
}

impl<R: NovelRepository> ContentFetcher<R> {
    pub fn new(repository: Arc<Mutex<R>>, fetcher: Fetcher, registry: Arc<SourceRegistry>) -> Self {
        Self {
            repository,
            fetcher,
            registry,
        }
    }

    /// Returns a chapter's content, fetching and storing it first if empty
    pub async fn fill_chapter(&self, novel: &Novel, chapter: &Chapter) -> Result<String, CrawlError> {
        if !chapter.content.is_empty() {
            return Ok(chapter.content.clone());
        }

        let chapter_id = chapter.id.ok_or_else(|| {
            StorageError::Database(format!(
                "chapter {} of '{}' has not been stored",
                chapter.number, novel.slug
            ))
        })?;

        let source = self
            .registry
            .get(&novel.source)
            .ok_or_else(|| CrawlError::UnknownSource(novel.source.clone()))?;
        let selectors = source
            .chapter
            .as_ref()
            .ok_or_else(|| CrawlError::NoChapterSelectors(source.name.clone()))?;

        let body = self.fetcher.fetch(&chapter.url).await?;
        let content = read_content(&chapter.url, &body, selectors)?;

        lock_repository(&self.repository)?.set_chapter_content(chapter_id, &content)?;
        tracing::debug!(novel = %novel.slug, number = chapter.number, "Stored chapter content");

        Ok(content)
    }

    /// Fills every chapter of the novel with `slug` that has no content yet
    ///
    /// Chapter failures are logged and counted; only a missing novel or a
    /// repository failure aborts.
    pub async fn fill_novel(&self, slug: &str) -> Result<FillReport, CrawlError> {
        let (novel, chapters) = self.load_novel(slug)?;
        let mut report = FillReport::default();

        for chapter in chapters.iter().filter(|c| c.content.is_empty()) {
            match self.fill_chapter(&novel, chapter).await {
                Ok(_) => report.filled += 1,
                Err(e) => {
                    tracing::warn!(
                        novel = %novel.slug,
                        url = %chapter.url,
                        "Failed to fill chapter {}: {}",
                        chapter.number,
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            novel = %novel.slug,
            filled = report.filled,
            failed = report.failed,
            "Chapter content fill finished"
        );

        Ok(report)
    }

    fn load_novel(&self, slug: &str) -> Result<(Novel, Vec<Chapter>), CrawlError> {
        let repository = lock_repository(&self.repository)?;

        let novel = repository
            .find_novel_by_slug(slug)?
            .ok_or_else(|| CrawlError::NovelNotFound(slug.to_string()))?;
        let novel_id = novel
            .id
            .ok_or_else(|| StorageError::UnsavedNovel(novel.source_url.clone()))?;
        let chapters = repository.list_chapters(novel_id)?;

        Ok((novel, chapters))
    }
}

fn read_content(
    url: &str,
    body: &str,
    selectors: &CompiledChapterSelectors,
) -> Result<String, CrawlError> {
    let document = parse_document(url, body)?;
    extract_chapter_content(&document, selectors).ok_or_else(|| CrawlError::EmptyContent(url.to_string()))
}
