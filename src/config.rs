//! Configuration module for Gator.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::rss::MAX_FEED_SIZE;
use crate::{GatorError, Result};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "gator.toml";

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL.
    #[serde(default = "default_db_url")]
    pub url: String,
}

fn default_db_url() -> String {
    "sqlite://data/gator.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty means console only.
    #[serde(default)]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: String::new(),
        }
    }
}

/// Feed aggregation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregatorConfig {
    /// Total deadline for a single feed request in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Maximum accepted feed body size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Value sent in the User-Agent header.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Advance `last_fetched_at` even when the fetch itself failed.
    #[serde(default)]
    pub mark_fetched_on_failure: bool,
}

fn default_request_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_max_feed_size() -> u64 {
    MAX_FEED_SIZE
}

fn default_max_redirects() -> usize {
    5
}

fn default_user_agent() -> String {
    "gator".to_string()
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_feed_size_bytes: default_max_feed_size(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
            mark_fetched_on_failure: false,
        }
    }
}

/// Per-machine session state.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Name of the user commands act on behalf of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user_name: Option<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Aggregator configuration.
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    /// Session state.
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(GatorError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| GatorError::Config(format!("config parse error: {e}")))
    }

    /// Write the configuration back to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| GatorError::Config(format!("config serialize error: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Set the current user and persist it.
    ///
    /// Only the session is written: the file at `path` is re-read (or
    /// defaults are used if it does not exist yet) so environment overrides
    /// applied to `self` never end up on disk.
    pub fn set_user<P: AsRef<Path>>(&mut self, name: &str, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut on_disk = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        on_disk.session.current_user_name = Some(name.to_string());
        on_disk.save(path)?;

        self.session.current_user_name = Some(name.to_string());
        Ok(())
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `GATOR_DATABASE_URL`: Override the database URL
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("GATOR_DATABASE_URL") {
            if !url.is_empty() {
                self.database.url = url;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(GatorError::Config("database.url must not be empty".to_string()));
        }
        if self.aggregator.request_timeout_secs == 0 {
            return Err(GatorError::Config(
                "aggregator.request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.aggregator.max_feed_size_bytes == 0 {
            return Err(GatorError::Config(
                "aggregator.max_feed_size_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
