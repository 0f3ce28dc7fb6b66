use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable that switches scheduled crawling on or off
pub const ENV_RUN_SCRAPER: &str = "RUN_SCRAPER";

/// Environment variable that overrides the crawl interval in hours
pub const ENV_INTERVAL: &str = "CRAWL_INTERVAL_HOURS";

/// Loads and parses a configuration file from the given path
///
/// Environment overrides ([`ENV_RUN_SCRAPER`], [`ENV_INTERVAL`]) are applied
/// after parsing and before validation.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let mut config: Config = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    validate(&config)?;

    Ok(config)
}

/// Applies environment-level toggles on top of a parsed configuration
///
/// `lookup` resolves a variable name to its value; `load_config` passes the
/// process environment.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_RUN_SCRAPER) {
        config.crawler.enabled = match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            other => {
                return Err(ConfigError::Validation(format!(
                    "{} must be true or false, got '{}'",
                    ENV_RUN_SCRAPER, other
                )))
            }
        };
    }

    if let Some(value) = lookup(ENV_INTERVAL) {
        config.crawler.interval_hours = value.trim().parse().map_err(|_| {
            ConfigError::Validation(format!(
                "{} must be a whole number of hours, got '{}'",
                ENV_INTERVAL, value
            ))
        })?;
    }

    Ok(())
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is recorded against every crawl run so that runs made under
/// different source definitions can be told apart.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
