//! Persisted holdings: where files go and how they are listed back.
//!
//! A destination string selects the backend by scheme:
//! - `gs://bucket/prefix` → Google Cloud Storage JSON API
//! - anything else → a local directory, created on first save
//!
//! File identifiers returned by [`Storage::list`] are full paths (local) or
//! `gs://` URIs, both of which the filename codec parses by their last segment.

pub mod format;
pub mod gcs;
pub mod local;

pub use format::OutputFormat;

use chrono::NaiveDate;
use etfscope_core::domain::HoldingsTable;
use etfscope_core::naming::holdings_filename;
use etfscope_core::{Classify, ErrorClass};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

use gcs::GcsClient;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet encoding failed: {0}")]
    Parquet(String),

    #[error("object store request failed: {0}")]
    Http(String),

    #[error("HTTP {status} from {url}")]
    GcsStatus { status: u16, url: String },

    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    #[error("{format} output requires the `{feature}` feature")]
    MissingDependency {
        format: &'static str,
        feature: &'static str,
    },

    #[error("malformed object listing: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn io(path: impl fmt::Display, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_string(),
            source,
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        StorageError::Http(e.to_string())
    }
}

impl Classify for StorageError {
    fn error_class(&self) -> ErrorClass {
        match self {
            StorageError::InvalidDestination(_) => ErrorClass::InvalidParameter,
            StorageError::MissingDependency { .. } => ErrorClass::MissingDependency,
            StorageError::GcsStatus { status, .. }
                if (400..500).contains(status) && *status != 408 && *status != 429 =>
            {
                ErrorClass::InvalidParameter
            }
            StorageError::GcsStatus { .. } | StorageError::Http(_) => ErrorClass::Transient,
            StorageError::Io { .. }
            | StorageError::Csv(_)
            | StorageError::Parquet(_)
            | StorageError::Json(_) => ErrorClass::Storage,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            StorageError::Io { .. } => "Io",
            StorageError::Csv(_) => "Csv",
            StorageError::Parquet(_) => "Parquet",
            StorageError::Http(_) => "Http",
            StorageError::GcsStatus { .. } => "GcsStatus",
            StorageError::InvalidDestination(_) => "InvalidDestination",
            StorageError::MissingDependency { .. } => "MissingDependency",
            StorageError::Json(_) => "Json",
        }
    }
}

// ── Destination ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Local(PathBuf),
    Gcs { bucket: String, prefix: String },
}

impl Destination {
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(StorageError::InvalidDestination("empty path".into()));
        }
        let Some(rest) = s.strip_prefix("gs://") else {
            return Ok(Destination::Local(PathBuf::from(s)));
        };
        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(StorageError::InvalidDestination(format!(
                "no bucket in {s}"
            )));
        }
        Ok(Destination::Gcs {
            bucket: bucket.to_string(),
            prefix: prefix.trim_matches('/').to_string(),
        })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Destination::Gcs { .. })
    }

    /// Identifier of `name` inside this destination, in the form `list` returns.
    pub fn join(&self, name: &str) -> String {
        match self {
            Destination::Local(dir) => dir.join(name).display().to_string(),
            Destination::Gcs { bucket, prefix } => {
                format!("gs://{bucket}/{}", object_name(prefix, name))
            }
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Local(dir) => write!(f, "{}", dir.display()),
            Destination::Gcs { bucket, prefix } if prefix.is_empty() => write!(f, "gs://{bucket}"),
            Destination::Gcs { bucket, prefix } => write!(f, "gs://{bucket}/{prefix}"),
        }
    }
}

pub(crate) fn object_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

// ── Settings ──

/// `[storage]` config table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub gcs_endpoint: String,
    /// Name of the environment variable holding an OAuth bearer token.
    pub gcs_token_env: String,
    pub timeout_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            gcs_endpoint: "https://storage.googleapis.com".into(),
            gcs_token_env: "GCS_OAUTH_TOKEN".into(),
            timeout_secs: 60,
        }
    }
}

// ── Storage ──

/// Uniform list/save/exists over local directories and GCS buckets.
#[derive(Debug, Clone)]
pub struct Storage {
    gcs: GcsClient,
}

impl Storage {
    pub fn new(settings: &StorageSettings) -> Result<Self, StorageError> {
        Ok(Self {
            gcs: GcsClient::new(settings)?,
        })
    }

    /// Every file under `dest` whose extension matches (leading dot optional).
    pub fn list(&self, dest: &Destination, extension: &str) -> Result<Vec<String>, StorageError> {
        let extension = extension.trim_start_matches('.');
        let files = match dest {
            Destination::Local(dir) => local::list(dir, extension)?,
            Destination::Gcs { bucket, prefix } => self.gcs.list(bucket, prefix, extension)?,
        };
        info!(destination = %dest, extension, files = files.len(), "listed existing files");
        Ok(files)
    }

    pub fn exists(&self, dest: &Destination, name: &str) -> Result<bool, StorageError> {
        match dest {
            Destination::Local(dir) => Ok(dir.join(name).is_file()),
            Destination::Gcs { bucket, prefix } => {
                self.gcs.exists(bucket, &object_name(prefix, name))
            }
        }
    }

    /// Encode `table` and write it as `{ticker}_{YYYY_MM_DD}.{ext}`; returns the identifier.
    pub fn save(
        &self,
        table: &HoldingsTable,
        ticker: &str,
        date: NaiveDate,
        dest: &Destination,
        format: OutputFormat,
    ) -> Result<String, StorageError> {
        let name = holdings_filename(ticker, date, format.extension());
        let bytes = format.encode(table)?;
        match dest {
            Destination::Local(dir) => local::write_atomic(&dir.join(&name), &bytes)?,
            Destination::Gcs { bucket, prefix } => self.gcs.upload(
                bucket,
                &object_name(prefix, &name),
                bytes,
                format.content_type(),
            )?,
        }
        let path = dest.join(&name);
        info!(ticker, %date, rows = table.len(), path = %path, "saved holdings");
        Ok(path)
    }
}
