//! etfscope runner: batch orchestration on top of `etfscope-core`.
//!
//! This crate provides:
//! - Retry policy with randomized exponential backoff
//! - Concurrent fetch orchestrator over a bounded worker pool
//! - Storage backends (local directory, Google Cloud Storage) and output formats
//! - Batch report with JSON export
//! - TOML scrape configuration
//! - The end-to-end `scrape_holdings` workflow and task sharding

pub mod config;
pub mod orchestrator;
pub mod report;
pub mod retry;
pub mod scrape;
pub mod storage;

pub use config::{ConfigError, ScrapeConfig, ScrapeSettings};
pub use orchestrator::{run_batch, run_item, BatchOptions, TaskError};
pub use report::{BatchReport, ItemOutcome, ReportEntry};
pub use retry::{RetryPolicy, RetrySettings};
pub use scrape::{
    list_chunk, parse_query_dates, query_listings, scrape_holdings, ScrapeError, ScrapeRequest,
};
pub use storage::{Destination, OutputFormat, Storage, StorageError, StorageSettings};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn storage_is_send_sync() {
        assert_send::<Storage>();
        assert_sync::<Storage>();
    }

    #[test]
    fn report_is_send_sync() {
        assert_send::<BatchReport>();
        assert_sync::<BatchReport>();
        assert_send::<ItemOutcome>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<TaskError>();
        assert_sync::<TaskError>();
        assert_send::<ScrapeError>();
    }

    #[test]
    fn config_is_send_sync() {
        assert_send::<ScrapeConfig>();
        assert_sync::<ScrapeRequest>();
    }
}
