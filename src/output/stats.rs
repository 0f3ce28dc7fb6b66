//! Statistics generation from the novel database
//!
//! This module provides functionality for extracting and displaying
//! repository statistics for the `--stats` mode.

use crate::storage::{NovelRepository, RunRecord};
use crate::CrawlError;

/// Repository statistics summary
#[derive(Debug, Clone)]
pub struct NovelStatistics {
    /// Total number of stored novels
    pub total_novels: u64,

    /// Total number of stored chapters
    pub total_chapters: u64,

    /// Chapters discovered but not fetched yet
    pub chapters_without_content: u64,

    /// Novel counts per source name, sorted by name
    pub novels_by_source: Vec<(String, u64)>,

    /// The most recent crawl run, if any
    pub latest_run: Option<RunRecord>,
}

impl NovelStatistics {
    /// Share of chapters whose content has been fetched, in percent
    pub fn content_coverage(&self) -> f64 {
        if self.total_chapters == 0 {
            return 0.0;
        }
        let filled = self.total_chapters - self.chapters_without_content;
        (filled as f64 / self.total_chapters as f64) * 100.0
    }
}

/// Loads statistics from storage
///
/// # Returns
///
/// * `Ok(NovelStatistics)` - Successfully loaded statistics
/// * `Err(CrawlError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn NovelRepository) -> Result<NovelStatistics, CrawlError> {
    Ok(NovelStatistics {
        total_novels: storage.count_novels()?,
        total_chapters: storage.count_chapters()?,
        chapters_without_content: storage.count_chapters_without_content()?,
        novels_by_source: storage.count_novels_by_source()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &NovelStatistics) {
    println!("=== Novel Statistics ===\n");

    println!("Overview:");
    println!("  Novels: {}", stats.total_novels);
    println!("  Chapters: {}", stats.total_chapters);
    println!(
        "  Chapters awaiting content: {}",
        stats.chapters_without_content
    );
    println!("  Content coverage: {:.1}%", stats.content_coverage());
    println!();

    if !stats.novels_by_source.is_empty() {
        println!("Novels by Source:");
        for (source, count) in &stats.novels_by_source {
            println!("  {}: {}", source, count);
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run (#{}):", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at.to_rfc3339());
            if let Some(finished) = run.finished_at {
                println!("  Finished: {}", finished.to_rfc3339());
                println!(
                    "  Duration: {}s",
                    (finished - run.started_at).num_seconds()
                );
            }
            println!("  Novels processed: {}", run.counts.novels_processed);
            println!("  Novels failed: {}", run.counts.novels_failed);
            println!("  Chapters created: {}", run.counts.chapters_created);
        }
        None => println!("No crawl runs recorded yet"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Chapter, Novel, RunCounts, RunStatus, SqliteStorage};
    use chrono::Utc;

    #[test]
    fn test_load_statistics() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let novel = storage
            .upsert_novel(&Novel::new(
                "A".to_string(),
                "a".to_string(),
                "LightNovelWorld".to_string(),
                "https://example.com/novel/a".to_string(),
                Utc::now(),
            ))
            .unwrap();

        let chapter = storage
            .create_chapter(&Chapter {
                id: None,
                novel_id: novel.id.unwrap(),
                title: "Chapter 1".to_string(),
                number: 1,
                url: "https://example.com/novel/a/1".to_string(),
                content: String::new(),
                published_at: Utc::now(),
                prev_chapter: None,
                next_chapter: None,
            })
            .unwrap();
        storage
            .set_chapter_content(chapter.id.unwrap(), "text")
            .unwrap();

        let run_id = storage.create_run("hash").unwrap();
        storage
            .complete_run(
                run_id,
                RunStatus::Completed,
                RunCounts {
                    novels_processed: 1,
                    novels_failed: 0,
                    chapters_created: 1,
                },
            )
            .unwrap();

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.total_novels, 1);
        assert_eq!(stats.total_chapters, 1);
        assert_eq!(stats.chapters_without_content, 0);
        assert_eq!(
            stats.novels_by_source,
            vec![("LightNovelWorld".to_string(), 1)]
        );
        assert_eq!(stats.latest_run.unwrap().id, run_id);
    }

    #[test]
    fn test_content_coverage() {
        let stats = NovelStatistics {
            total_novels: 2,
            total_chapters: 4,
            chapters_without_content: 3,
            novels_by_source: vec![],
            latest_run: None,
        };
        assert!((stats.content_coverage() - 25.0).abs() < f64::EPSILON);

        let empty = NovelStatistics {
            total_chapters: 0,
            chapters_without_content: 0,
            ..stats
        };
        assert_eq!(empty.content_coverage(), 0.0);
    }
}
