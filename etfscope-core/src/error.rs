//! Fetch-level error type and the error classes shared by retries and reports.
//!
//! Every error that can reach the orchestrator implements [`Classify`], which
//! answers two questions: which bucket of the taxonomy does it belong to (and
//! therefore whether it is worth retrying), and what short kind name should the
//! batch report carry.

use crate::domain::{FundType, Provider};
use crate::parse::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error taxonomy buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Semantically impossible request: unsupported query, unknown ticker, missing columns.
    InvalidParameter,
    /// The provider answered for a different ticker, date or product than requested.
    DataIntegrity,
    Parse,
    NoData,
    /// Network failures, rate limiting, server errors.
    Transient,
    Storage,
    /// An optional cargo feature needed for this item is not compiled in.
    MissingDependency,
}

impl ErrorClass {
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ErrorClass::InvalidParameter | ErrorClass::DataIntegrity | ErrorClass::MissingDependency
        )
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Implemented by every error type that can fail a batch item.
pub trait Classify {
    fn error_class(&self) -> ErrorClass;

    /// Variant name reported as `error_class` in batch reports.
    fn kind(&self) -> &'static str;

    fn is_retryable(&self) -> bool {
        self.error_class().is_retryable()
    }

    /// Minimum wait the server asked for before the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Errors raised while resolving a ticker and fetching its holdings.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no listing found for ticker {ticker}")]
    UnknownTicker { ticker: String },

    #[error("ticker {ticker} matches {count} listings")]
    AmbiguousTicker { ticker: String, count: usize },

    #[error("{provider} does not support this query: {reason}")]
    UnsupportedQuery { provider: Provider, reason: String },

    #[error("{provider} does not support fund type {fund_type:?} for {ticker}")]
    UnsupportedFundType {
        provider: Provider,
        ticker: String,
        fund_type: Option<FundType>,
    },

    #[error("listing for {ticker} belongs to {listed}, not {client}")]
    WrongProvider {
        ticker: String,
        listed: Provider,
        client: Provider,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("no client registered for provider {0}")]
    UnknownProvider(Provider),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Network(e.to_string())
    }
}

impl Classify for FetchError {
    fn error_class(&self) -> ErrorClass {
        match self {
            FetchError::UnknownTicker { .. }
            | FetchError::AmbiguousTicker { .. }
            | FetchError::UnsupportedQuery { .. }
            | FetchError::UnsupportedFundType { .. }
            | FetchError::WrongProvider { .. }
            | FetchError::UnknownProvider(_) => ErrorClass::InvalidParameter,
            // 408 and 429 are worth waiting out; other client errors are not.
            FetchError::HttpStatus { status, .. }
                if (400..500).contains(status) && *status != 408 && *status != 429 =>
            {
                ErrorClass::InvalidParameter
            }
            FetchError::HttpStatus { .. }
            | FetchError::Network(_)
            | FetchError::RateLimited { .. } => ErrorClass::Transient,
            FetchError::Parse(e) => e.error_class(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            FetchError::UnknownTicker { .. } => "UnknownTicker",
            FetchError::AmbiguousTicker { .. } => "AmbiguousTicker",
            FetchError::UnsupportedQuery { .. } => "UnsupportedQuery",
            FetchError::UnsupportedFundType { .. } => "UnsupportedFundType",
            FetchError::WrongProvider { .. } => "WrongProvider",
            FetchError::Network(_) => "Network",
            FetchError::HttpStatus { .. } => "HttpStatus",
            FetchError::RateLimited { .. } => "RateLimited",
            FetchError::Parse(e) => e.kind(),
            FetchError::UnknownProvider(_) => "UnknownProvider",
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after_secs } if *retry_after_secs > 0 => {
                Some(Duration::from_secs(*retry_after_secs))
            }
            _ => None,
        }
    }
}
