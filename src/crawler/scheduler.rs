//! Crawl cycle scheduling
//!
//! A crawl cycle walks every registered source: fetch the listing page,
//! extract its entries and reconcile each entry as an independent unit.
//! Sources run concurrently and units fan out under a shared semaphore.
//!
//! At most one cycle runs at a time. A cycle that comes due while another is
//! still running is skipped, and once shutdown is signalled no new unit
//! starts while units already in flight are allowed to finish.

use crate::config::CrawlerConfig;
use crate::crawler::extractor::{extract_listing, parse_document, ListingEntry};
use crate::crawler::reconciler::{lock_repository, Reconciler};
use crate::crawler::Fetcher;
use crate::source::{CompiledSource, SourceRegistry};
use crate::storage::{NovelRepository, RunCounts, RunStatus, StorageResult};
use crate::{CrawlError, ParseError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;

/// Summary of one crawl cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Id of the run recorded for this cycle
    pub run_id: i64,
    pub sources: usize,
    pub sources_failed: usize,
    pub novels_processed: u64,
    pub novels_created: u64,
    pub novels_failed: u64,
    pub chapters_created: u64,
    /// Shutdown was signalled before every entry was started
    pub interrupted: bool,
}

/// Per-source tallies merged into a [`CycleReport`]
#[derive(Debug, Default)]
struct SourceTally {
    novels_processed: u64,
    novels_created: u64,
    novels_failed: u64,
    chapters_created: u64,
    interrupted: bool,
}

impl CycleReport {
    fn absorb(&mut self, tally: SourceTally) {
        self.novels_processed += tally.novels_processed;
        self.novels_created += tally.novels_created;
        self.novels_failed += tally.novels_failed;
        self.chapters_created += tally.chapters_created;
        self.interrupted |= tally.interrupted;
    }

    fn counts(&self) -> RunCounts {
        RunCounts {
            novels_processed: self.novels_processed,
            novels_failed: self.novels_failed,
            chapters_created: self.chapters_created,
        }
    }
}

/// Runs crawl cycles over a source registry
pub struct Scheduler<R> {
    registry: Arc<SourceRegistry>,
    repository: Arc<Mutex<R>>,
    reconciler: Arc<Reconciler<R>>,
    fetcher: Fetcher,
    config_hash: String,
    interval: Duration,
    enabled: bool,
    max_concurrent: usize,
    cycle_guard: Arc<tokio::sync::Mutex<()>>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<R> Clone for Scheduler<R> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            repository: Arc::clone(&self.repository),
            reconciler: Arc::clone(&self.reconciler),
            fetcher: self.fetcher.clone(),
            config_hash: self.config_hash.clone(),
            interval: self.interval,
            enabled: self.enabled,
            max_concurrent: self.max_concurrent,
            cycle_guard: Arc::clone(&self.cycle_guard),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<R> Scheduler<R>
where
    R: NovelRepository + Send + 'static,
{
    /// Creates a scheduler
    ///
    /// # Arguments
    ///
    /// * `registry` - The sources every cycle walks through
    /// * `repository` - Shared repository
    /// * `fetcher` - Fetcher for listing and detail pages
    /// * `config` - Interval, staleness window, concurrency bound and enable flag
    pub fn new(
        registry: SourceRegistry,
        repository: Arc<Mutex<R>>,
        fetcher: Fetcher,
        config: &CrawlerConfig,
    ) -> Self {
        let staleness = chrono::Duration::days(i64::from(config.staleness_days));
        let reconciler = Reconciler::new(Arc::clone(&repository), fetcher.clone(), staleness);

        Self {
            registry: Arc::new(registry),
            repository,
            reconciler: Arc::new(reconciler),
            fetcher,
            config_hash: String::new(),
            interval: Duration::from_secs(config.interval_hours.max(1).saturating_mul(3600)),
            enabled: config.enabled,
            max_concurrent: config.max_concurrent_novels.max(1) as usize,
            cycle_guard: Arc::new(tokio::sync::Mutex::new(())),
            shutdown: None,
        }
    }

    /// Sets the configuration hash recorded against every run
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    /// Overrides the interval between scheduled cycles
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Makes cycles stop starting new units once `shutdown` turns true
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Runs one crawl cycle over every registered source
    ///
    /// # Returns
    ///
    /// * `Ok(CycleReport)` - The cycle ran; per-source and per-unit failures are counted, not returned
    /// * `Err(CrawlError::CycleInProgress)` - Another cycle is running
    /// * `Err(CrawlError)` - The run ledger could not be written
    pub async fn run_crawl_cycle(&self) -> Result<CycleReport, CrawlError> {
        let _cycle = self
            .cycle_guard
            .try_lock()
            .map_err(|_| CrawlError::CycleInProgress)?;

        let run_id = self.with_repository(|r| r.create_run(&self.config_hash))?;
        tracing::info!(
            run_id,
            sources = self.registry.len(),
            "Starting crawl cycle"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut sources = JoinSet::new();

        for source in self.registry.iter() {
            let scheduler = self.clone();
            let source = Arc::clone(source);
            let semaphore = Arc::clone(&semaphore);
            sources.spawn(async move { scheduler.crawl_source(source, semaphore).await });
        }

        let mut report = CycleReport {
            run_id,
            sources: self.registry.len(),
            ..CycleReport::default()
        };

        while let Some(joined) = sources.join_next().await {
            match joined {
                Ok(Ok(tally)) => report.absorb(tally),
                Ok(Err(_)) => report.sources_failed += 1,
                Err(e) => {
                    tracing::error!("Source task failed: {}", e);
                    report.sources_failed += 1;
                }
            }
        }

        let status = if report.interrupted {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        self.with_repository(|r| r.complete_run(run_id, status, report.counts()))?;

        tracing::info!(
            run_id,
            novels = report.novels_processed,
            created = report.novels_created,
            failed = report.novels_failed,
            chapters = report.chapters_created,
            sources_failed = report.sources_failed,
            interrupted = report.interrupted,
            "Crawl cycle finished"
        );

        Ok(report)
    }

    /// Runs a cycle now and then one every interval until `shutdown` turns true
    ///
    /// Returns immediately when crawling is disabled. On shutdown the cycle in
    /// flight stops starting units and is awaited before returning.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), CrawlError> {
        if !self.enabled {
            tracing::info!("Scheduled crawling is disabled");
            return Ok(());
        }

        let scheduler = self.clone().with_shutdown(shutdown.clone());
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = JoinSet::new();

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let scheduler = scheduler.clone();
                    cycles.spawn(async move { scheduler.run_crawl_cycle().await });
                }
                Some(joined) = cycles.join_next() => log_cycle_result(joined),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Shutdown requested, waiting for the running cycle to finish");
        while let Some(joined) = cycles.join_next().await {
            log_cycle_result(joined);
        }

        Ok(())
    }

    async fn crawl_source(
        self,
        source: Arc<CompiledSource>,
        semaphore: Arc<Semaphore>,
    ) -> Result<SourceTally, CrawlError> {
        let body = self
            .fetcher
            .fetch(source.listing_url.as_str())
            .await
            .map_err(|e| {
                tracing::warn!(source = %source.name, url = %e.url, "Skipping source: {}", e.cause);
                e
            })?;

        let entries = read_listing(&source, &body).map_err(|e| {
            tracing::warn!(source = %source.name, url = %e.url, "Skipping source: {}", e.message);
            e
        })?;

        tracing::info!(
            source = %source.name,
            entries = entries.len(),
            "Fetched listing"
        );

        let mut tally = SourceTally::default();
        let mut units = JoinSet::new();

        for entry in entries {
            if self.is_shutting_down() {
                tally.interrupted = true;
                break;
            }

            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };

            // Shutdown may have fired while waiting for a permit
            if self.is_shutting_down() {
                tally.interrupted = true;
                break;
            }

            let reconciler = Arc::clone(&self.reconciler);
            let source = Arc::clone(&source);
            units.spawn(async move {
                let _permit = permit;
                let result = reconciler.reconcile_entry(&source, &entry).await;
                (entry, result)
            });
        }

        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((_, Ok(outcome))) => {
                    tally.novels_processed += 1;
                    tally.chapters_created += outcome.chapters_created;
                    if outcome.created {
                        tally.novels_created += 1;
                    }
                }
                Ok((entry, Err(e))) => {
                    tracing::warn!(
                        source = %source.name,
                        url = %entry.url,
                        "Failed to reconcile '{}': {}",
                        entry.title,
                        e
                    );
                    tally.novels_failed += 1;
                }
                Err(e) => {
                    tracing::error!(source = %source.name, "Unit task failed: {}", e);
                    tally.novels_failed += 1;
                }
            }
        }

        Ok(tally)
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.as_ref().map_or(false, |rx| *rx.borrow())
    }

    fn with_repository<T>(
        &self,
        f: impl FnOnce(&mut R) -> StorageResult<T>,
    ) -> Result<T, CrawlError> {
        let mut repository = lock_repository(&self.repository)?;
        Ok(f(&mut repository)?)
    }
}

fn read_listing(source: &CompiledSource, body: &str) -> Result<Vec<ListingEntry>, ParseError> {
    let document = parse_document(source.listing_url.as_str(), body)?;
    Ok(extract_listing(&document, &source.listing, &source.base_url))
}

fn log_cycle_result(joined: Result<Result<CycleReport, CrawlError>, JoinError>) {
    match joined {
        Ok(Ok(_)) => {}
        Ok(Err(CrawlError::CycleInProgress)) => {
            tracing::warn!("Previous crawl cycle still running, skipping this one");
        }
        Ok(Err(e)) => tracing::error!("Crawl cycle failed: {}", e),
        Err(e) => tracing::error!("Crawl cycle task failed: {}", e),
    }
}
