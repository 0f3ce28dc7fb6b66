//! Configuration module for Novel-Crawler
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and applying the environment-level crawl toggles on top.
//!
//! # Example
//!
//! ```no_run
//! use novel_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawl every {} hours", config.crawler.interval_hours);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_with_hash, ENV_INTERVAL,
    ENV_RUN_SCRAPER,
};
pub use validation::validate;
