//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock source sites and run full crawl
//! cycles end-to-end, from a configuration file on disk to an on-disk
//! SQLite database.

use novel_crawler::config::{load_config_with_hash, Config};
use novel_crawler::crawler::{ContentFetcher, Fetcher, Scheduler};
use novel_crawler::storage::{open_storage, NovelRepository, RunStatus, SqliteStorage};
use novel_crawler::SourceRegistry;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Writes a configuration with one `[[source]]` per mock server and loads it
fn write_config(dir: &TempDir, servers: &[(&str, &MockServer)]) -> (Config, String) {
    let db_path = dir.path().join("novels.db");
    let mut toml = format!(
        r#"
[crawler]
max-concurrent-novels = 2
request-timeout-secs = 5

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = '{}'
"#,
        db_path.display()
    );

    for (name, server) in servers {
        toml.push_str(&format!(
            r##"
[[source]]
name = "{name}"
base-url = "{uri}"
listing-path = "/latest"

[source.listing]
list = ".novel-list .novel-item"
title = ".novel-title a"
cover = ".novel-cover img"
author = ".novel-author"
detail-link = ".novel-title a"

[source.detail]
description = ".summary"
genres = ".categories a"
status = ".header-stats .status strong"
rating = ".header-stats .rating strong"
chapter-list = ".chapter-list li"
chapter-title = "a"
chapter-link = "a"
chapter-date = ".chapter-date"

[source.chapter]
content = "#chapter-container"
"##,
            uri = server.uri()
        ));
    }

    let config_path = dir.path().join("config.toml");
    std::fs::write(&config_path, toml).expect("Failed to write config");
    load_config_with_hash(&config_path).expect("Failed to load config")
}

fn scheduler_for(config: &Config, hash: &str) -> (Scheduler<SqliteStorage>, Arc<Mutex<SqliteStorage>>) {
    let registry = SourceRegistry::from_config(config).expect("Invalid registry");
    let storage = open_storage(Path::new(&config.output.database_path)).expect("Failed to open db");
    let repository = Arc::new(Mutex::new(storage));
    let fetcher = Fetcher::new(&config.user_agent, Duration::from_secs(5)).expect("Client");

    let scheduler = Scheduler::new(registry, Arc::clone(&repository), fetcher, &config.crawler)
        .with_config_hash(hash);
    (scheduler, repository)
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// A listing with one complete row and one row lacking a detail link
const LISTING: &str = r#"<html><body><ul class="novel-list">
    <li class="novel-item">
      <div class="novel-cover"><img src="/covers/shadow.jpg"></div>
      <h4 class="novel-title"><a href="/novel/shadow-slave#top">Shadow Slave</a></h4>
      <div class="novel-author">Guiltythree</div>
    </li>
    <li class="novel-item">
      <h4 class="novel-title"><a>Broken Row</a></h4>
    </li>
</ul></body></html>"#;

/// A detail page listing three chapters, newest first
const DETAIL: &str = r#"<html><body>
    <div class="header-stats">
      <span class="rating"><strong>4.6</strong></span>
      <span class="status"><strong>Ongoing</strong></span>
    </div>
    <div class="categories"><a>Fantasy</a><a>Mystery</a></div>
    <div class="summary">Growing up in poverty, Sunny never expected anything good from life.</div>
    <ul class="chapter-list">
      <li><a href="/novel/shadow-slave/chapter-3">Chapter 3: Nightmare</a><span class="chapter-date">2 hours ago</span></li>
      <li><a href="/novel/shadow-slave/chapter-2">Chapter 2: Spell</a><span class="chapter-date">Mar 5, 2023</span></li>
      <li><a href="/novel/shadow-slave/chapter-1">Chapter 1: Awakening</a><span class="chapter-date">Mar 1, 2023</span></li>
    </ul>
</body></html>"#;

async fn mount_source(server: &MockServer) {
    mount_page(server, "/latest", LISTING).await;
    mount_page(server, "/novel/shadow-slave", DETAIL).await;
}

#[tokio::test]
async fn test_full_cycle_single_source() {
    let server = MockServer::start().await;
    mount_source(&server).await;

    let dir = TempDir::new().unwrap();
    let (config, hash) = write_config(&dir, &[("Mock", &server)]);
    let (scheduler, repository) = scheduler_for(&config, &hash);

    let report = scheduler.run_crawl_cycle().await.expect("Cycle failed");
    assert_eq!(report.novels_processed, 1);
    assert_eq!(report.novels_created, 1);
    assert_eq!(report.novels_failed, 0);
    assert_eq!(report.chapters_created, 3);

    let repository = repository.lock().unwrap();
    assert_eq!(repository.count_novels().unwrap(), 1);

    let novel = repository
        .find_novel_by_slug("shadow-slave")
        .unwrap()
        .expect("Novel should be stored");
    assert_eq!(novel.title, "Shadow Slave");
    assert_eq!(novel.source, "Mock");
    assert_eq!(
        novel.source_url,
        format!("{}/novel/shadow-slave", server.uri())
    );
    assert_eq!(novel.author.as_deref(), Some("Guiltythree"));
    assert_eq!(
        novel.cover_url,
        Some(format!("{}/covers/shadow.jpg", server.uri()))
    );
    assert_eq!(novel.genres, vec!["Fantasy", "Mystery"]);
    assert_eq!(novel.status.as_deref(), Some("Ongoing"));
    assert_eq!(novel.rating.as_deref(), Some("4.6"));
    assert_eq!(novel.chapter_count, 3);

    let chapters = repository.list_chapters(novel.id.unwrap()).unwrap();
    let numbers: Vec<u32> = chapters.iter().map(|c| c.number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);

    // The first listed chapter is the newest and gets the highest number
    assert_eq!(chapters[2].title, "Chapter 3: Nightmare");
    assert_eq!(chapters[0].title, "Chapter 1: Awakening");

    // Neighbours are linked by number
    assert_eq!(chapters[0].prev_chapter, None);
    assert_eq!(chapters[0].next_chapter, chapters[1].id);
    assert_eq!(chapters[2].prev_chapter, chapters[1].id);
    assert_eq!(chapters[2].next_chapter, None);

    let run = repository.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, hash);
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_second_cycle_is_idempotent() {
    let server = MockServer::start().await;
    mount_source(&server).await;

    let dir = TempDir::new().unwrap();
    let (config, hash) = write_config(&dir, &[("Mock", &server)]);
    let (scheduler, repository) = scheduler_for(&config, &hash);

    let first = scheduler.run_crawl_cycle().await.unwrap();
    let first_updated = repository
        .lock()
        .unwrap()
        .find_novel_by_slug("shadow-slave")
        .unwrap()
        .unwrap()
        .last_updated;

    let second = scheduler.run_crawl_cycle().await.unwrap();
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(second.novels_created, 0);
    assert_eq!(second.chapters_created, 0);

    let repository = repository.lock().unwrap();
    assert_eq!(repository.count_novels().unwrap(), 1);
    assert_eq!(repository.count_chapters().unwrap(), 3);

    let novel = repository.find_novel_by_slug("shadow-slave").unwrap().unwrap();
    assert!(novel.last_updated >= first_updated);
}

#[tokio::test]
async fn test_failing_source_does_not_affect_others() {
    let healthy = MockServer::start().await;
    mount_source(&healthy).await;

    let broken = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;

    let dir = TempDir::new().unwrap();
    let (config, hash) = write_config(&dir, &[("Healthy", &healthy), ("Broken", &broken)]);
    let (scheduler, repository) = scheduler_for(&config, &hash);

    let report = scheduler.run_crawl_cycle().await.unwrap();
    assert_eq!(report.sources, 2);
    assert_eq!(report.sources_failed, 1);
    assert_eq!(report.novels_processed, 1);

    let repository = repository.lock().unwrap();
    assert_eq!(
        repository.count_novels_by_source().unwrap(),
        vec![("Healthy".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_non_markup_listing_skips_source() {
    let server = MockServer::start().await;
    mount_page(&server, "/latest", "").await;

    let dir = TempDir::new().unwrap();
    let (config, hash) = write_config(&dir, &[("Mock", &server)]);
    let (scheduler, repository) = scheduler_for(&config, &hash);

    let report = scheduler.run_crawl_cycle().await.unwrap();
    assert_eq!(report.sources_failed, 1);
    assert_eq!(repository.lock().unwrap().count_novels().unwrap(), 0);
}

#[tokio::test]
async fn test_fill_content_after_crawl() {
    let server = MockServer::start().await;
    mount_source(&server).await;
    for n in 1..=3 {
        mount_page(
            &server,
            &format!("/novel/shadow-slave/chapter-{}", n),
            &format!(
                r#"<html><body><div id="chapter-container"><p>Chapter {} text.</p></div></body></html>"#,
                n
            ),
        )
        .await;
    }

    let dir = TempDir::new().unwrap();
    let (config, hash) = write_config(&dir, &[("Mock", &server)]);
    let (scheduler, repository) = scheduler_for(&config, &hash);
    scheduler.run_crawl_cycle().await.unwrap();

    assert_eq!(
        repository
            .lock()
            .unwrap()
            .count_chapters_without_content()
            .unwrap(),
        3
    );

    let content = ContentFetcher::new(
        Arc::clone(&repository),
        Fetcher::new(&config.user_agent, Duration::from_secs(5)).unwrap(),
        Arc::new(scheduler.registry().clone()),
    );
    let report = content.fill_novel("shadow-slave").await.unwrap();
    assert_eq!(report.filled, 3);
    assert_eq!(report.failed, 0);

    let repository = repository.lock().unwrap();
    assert_eq!(repository.count_chapters_without_content().unwrap(), 0);
    let novel = repository.find_novel_by_slug("shadow-slave").unwrap().unwrap();
    let chapters = repository.list_chapters(novel.id.unwrap()).unwrap();
    assert_eq!(chapters[1].content, "Chapter 2 text.");
}

#[tokio::test]
async fn test_database_persists_across_reopen() {
    let server = MockServer::start().await;
    mount_source(&server).await;

    let dir = TempDir::new().unwrap();
    let (config, hash) = write_config(&dir, &[("Mock", &server)]);
    {
        let (scheduler, _repository) = scheduler_for(&config, &hash);
        scheduler.run_crawl_cycle().await.unwrap();
    }

    let storage = open_storage(Path::new(&config.output.database_path)).unwrap();
    let novels = storage.list_novels(1, 20).unwrap();
    assert_eq!(novels.len(), 1);
    assert_eq!(novels[0].slug, "shadow-slave");
}
