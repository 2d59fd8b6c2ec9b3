//! Scrape configuration loaded from TOML.
//!
//! Every table and field has a default, so an empty file is a valid config:
//!
//! ```toml
//! [scrape]
//! save_dir = "gs://bucket/holdings"
//! format = "parquet"
//! num_threads = 8
//!
//! [retry]
//! max_attempts = 3
//!
//! [providers]
//! timeout_secs = 30
//!
//! [storage]
//! gcs_token_env = "GCS_OAUTH_TOKEN"
//! ```

use crate::retry::RetrySettings;
use crate::storage::{OutputFormat, StorageSettings};
use etfscope_core::providers::ProviderSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// `[scrape]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeSettings {
    /// Local directory or `gs://bucket/prefix`.
    pub save_dir: String,
    /// Where to look for already-persisted files; defaults to `save_dir`.
    pub existing_dir: Option<String>,
    pub format: OutputFormat,
    pub num_threads: usize,
    /// Exchange code for trading-day planning.
    pub exchange: String,
    /// Listing snapshot CSV.
    pub listings_file: Option<PathBuf>,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            save_dir: "holdings".into(),
            existing_dir: None,
            format: OutputFormat::Csv,
            num_threads: 10,
            exchange: "NYSE".into(),
            listings_file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub scrape: ScrapeSettings,
    pub retry: RetrySettings,
    pub providers: ProviderSettings,
    pub storage: StorageSettings,
}

impl ScrapeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scrape.num_threads == 0 {
            return Err(ConfigError::Invalid("scrape.num_threads must be at least 1".into()));
        }
        if self.scrape.save_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("scrape.save_dir is empty".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        Ok(())
    }

    /// Directory scanned for existing files.
    pub fn existing_dir(&self) -> &str {
        self.scrape
            .existing_dir
            .as_deref()
            .unwrap_or(&self.scrape.save_dir)
    }
}
