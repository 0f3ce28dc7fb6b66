//! Novel-Crawler main entry point
//!
//! This is the command-line interface for the Novel-Crawler aggregator.

use anyhow::Context;
use clap::Parser;
use novel_crawler::config::{load_config_with_hash, Config};
use novel_crawler::crawler::{ContentFetcher, Fetcher, Scheduler};
use novel_crawler::storage::{open_storage, SqliteStorage};
use novel_crawler::SourceRegistry;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Novel-Crawler: a serialized fiction aggregator
///
/// Novel-Crawler periodically crawls novel listing sites, extracts novels and
/// their chapter indexes with per-source CSS selectors, and keeps a local
/// database of them up to date.
#[derive(Parser, Debug)]
#[command(name = "novel-crawler")]
#[command(version = "1.0.0")]
#[command(about = "A serialized fiction aggregator", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run a single crawl cycle and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "fill_content"])]
    once: bool,

    /// Validate config and show the sources that would be crawled
    #[arg(long, conflicts_with_all = ["stats", "fill_content"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "fill_content")]
    stats: bool,

    /// Fetch the content of every empty chapter of the novel with this slug
    #[arg(long, value_name = "SLUG")]
    fill_content: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let registry = SourceRegistry::from_config(&config)?;

    if cli.dry_run {
        handle_dry_run(&config, &registry);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(slug) = cli.fill_content.as_deref() {
        handle_fill_content(&config, registry, slug).await?;
    } else if cli.once {
        handle_once(&config, registry, config_hash).await?;
    } else {
        handle_scheduled(&config, registry, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("novel_crawler=info,warn"),
            1 => EnvFilter::new("novel_crawler=debug,info"),
            2 => EnvFilter::new("novel_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_repository(config: &Config) -> anyhow::Result<Arc<Mutex<SqliteStorage>>> {
    let storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open database {}", config.output.database_path))?;
    Ok(Arc::new(Mutex::new(storage)))
}

fn build_fetcher(config: &Config) -> anyhow::Result<Fetcher> {
    let timeout = Duration::from_secs(config.crawler.request_timeout_secs);
    Fetcher::new(&config.user_agent, timeout).context("Failed to build HTTP client")
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, registry: &SourceRegistry) {
    println!("=== Novel-Crawler Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Scheduled crawling: {}", if config.crawler.enabled { "enabled" } else { "disabled" });
    println!("  Interval: {}h", config.crawler.interval_hours);
    println!("  Staleness window: {} days", config.crawler.staleness_days);
    println!(
        "  Max concurrent novels: {}",
        config.crawler.max_concurrent_novels
    );
    println!(
        "  Request timeout: {}s",
        config.crawler.request_timeout_secs
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let origin = if config.sources.is_empty() {
        "built-in"
    } else {
        "configured"
    };
    println!("\nSources ({}, {}):", registry.len(), origin);
    for source in registry.iter() {
        println!("  - {}", source.name);
        println!("    * listing: {}", source.listing_url);
        println!(
            "    * chapter content: {}",
            if source.chapter.is_some() { "yes" } else { "no" }
        );
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use novel_crawler::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --fill-content mode: fetches missing chapter bodies of one novel
async fn handle_fill_content(
    config: &Config,
    registry: SourceRegistry,
    slug: &str,
) -> anyhow::Result<()> {
    let content = ContentFetcher::new(
        open_repository(config)?,
        build_fetcher(config)?,
        Arc::new(registry),
    );

    let report = content.fill_novel(slug).await?;
    println!(
        "✓ Filled {} chapter(s) of '{}' ({} failed)",
        report.filled, slug, report.failed
    );

    Ok(())
}

/// Handles the --once mode: a single crawl cycle
async fn handle_once(
    config: &Config,
    registry: SourceRegistry,
    config_hash: String,
) -> anyhow::Result<()> {
    let scheduler = Scheduler::new(
        registry,
        open_repository(config)?,
        build_fetcher(config)?,
        &config.crawler,
    )
    .with_config_hash(config_hash);

    let report = scheduler.run_crawl_cycle().await?;
    println!(
        "✓ Run {}: {} novel(s) processed ({} new, {} failed), {} chapter(s) created",
        report.run_id,
        report.novels_processed,
        report.novels_created,
        report.novels_failed,
        report.chapters_created
    );
    if report.sources_failed > 0 {
        println!(
            "⚠ {} of {} source(s) could not be crawled",
            report.sources_failed, report.sources
        );
    }

    Ok(())
}

/// Handles the default mode: scheduled crawling until Ctrl-C
async fn handle_scheduled(
    config: &Config,
    registry: SourceRegistry,
    config_hash: String,
) -> anyhow::Result<()> {
    let scheduler = Scheduler::new(
        registry,
        open_repository(config)?,
        build_fetcher(config)?,
        &config.crawler,
    )
    .with_config_hash(config_hash);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl-C, shutting down");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    scheduler.run(shutdown_rx).await?;
    Ok(())
}
