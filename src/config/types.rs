use crate::source::SourceDefinition;
use serde::Deserialize;

/// Main configuration structure for Novel-Crawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    /// Source sites to crawl; the built-in registry is used when empty
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceDefinition>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Whether scheduled crawling runs at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Hours between the start of two scheduled crawl cycles
    #[serde(rename = "interval-hours", default = "default_interval_hours")]
    pub interval_hours: u64,

    /// Age in days after which a novel's detail fields are re-extracted
    #[serde(rename = "staleness-days", default = "default_staleness_days")]
    pub staleness_days: u32,

    /// Maximum number of novels reconciled concurrently within one cycle
    #[serde(
        rename = "max-concurrent-novels",
        default = "default_max_concurrent_novels"
    )]
    pub max_concurrent_novels: u32,

    /// Per-request timeout in seconds
    #[serde(
        rename = "request-timeout-secs",
        default = "default_request_timeout_secs"
    )]
    pub request_timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_interval_hours() -> u64 {
    6
}

fn default_staleness_days() -> u32 {
    7
}

fn default_max_concurrent_novels() -> u32 {
    4
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_hours: default_interval_hours(),
            staleness_days: default_staleness_days(),
            max_concurrent_novels: default_max_concurrent_novels(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}
