//! Concurrent fetch orchestrator.
//!
//! Each `(ticker, date)` key is an independent unit of work:
//! 1. Query the holdings source (listing lookup, provider fetch, parse)
//! 2. Resolve the effective date: the query date, else the parsed as-of date
//! 3. Hand the table to the save callback
//!
//! Units run on a bounded rayon pool under a [`RetryPolicy`]. Every failure,
//! panics included, becomes a report entry; nothing escapes a batch.

use crate::report::{BatchReport, ItemOutcome};
use crate::retry::RetryPolicy;
use crate::storage::StorageError;
use chrono::NaiveDate;
use etfscope_core::domain::{HoldingsTable, QueryKey};
use etfscope_core::{Classify, ErrorClass, FetchError, HoldingsSource};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::error::Error as StdError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Persist a parsed table for `(ticker, effective date)`; `Ok(None)` means skipped.
pub type SaveFn<'a> =
    dyn Fn(&HoldingsTable, &str, NaiveDate) -> Result<Option<String>, StorageError> + Sync + 'a;

/// Why a single batch item failed.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("task panicked: {0}")]
    Panicked(String),
}

impl Classify for TaskError {
    fn error_class(&self) -> ErrorClass {
        match self {
            TaskError::Fetch(e) => e.error_class(),
            TaskError::Storage(e) => e.error_class(),
            TaskError::Panicked(_) => ErrorClass::Parse,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            TaskError::Fetch(e) => e.kind(),
            TaskError::Storage(e) => e.kind(),
            TaskError::Panicked(_) => "Panicked",
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            TaskError::Panicked(_) => false,
            other => other.error_class().is_retryable(),
        }
    }

    fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            TaskError::Fetch(e) => e.retry_after(),
            _ => None,
        }
    }
}

/// Display of `err` followed by every source, one per line.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\ncaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Worker threads; zero is treated as one.
    pub threads: usize,
    pub retry: RetryPolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            threads: 10,
            retry: RetryPolicy::default(),
        }
    }
}

struct Saved {
    path: Option<String>,
    date: NaiveDate,
    rows: usize,
}

fn fetch_and_save(
    key: &QueryKey,
    source: &dyn HoldingsSource,
    save: &SaveFn<'_>,
) -> Result<Saved, TaskError> {
    let unit = || -> Result<Saved, TaskError> {
        let table = source.query_holdings(&key.ticker, key.date)?;
        let date = key.date.unwrap_or(table.as_of_date);
        let path = save(&table, &key.ticker, date)?;
        Ok(Saved {
            path,
            date,
            rows: table.len(),
        })
    };
    catch_unwind(AssertUnwindSafe(unit)).unwrap_or_else(|p| Err(TaskError::Panicked(panic_message(p))))
}

/// Run one key to a terminal state.
pub fn run_item(
    key: &QueryKey,
    source: &dyn HoldingsSource,
    save: &SaveFn<'_>,
    retry: &RetryPolicy,
) -> ItemOutcome {
    let label = key.to_string();
    let outcome = retry.run(&label, |attempt| {
        debug!(item = %label, attempt, "fetching");
        fetch_and_save(key, source, save)
    });

    match outcome.result {
        Ok(saved) => ItemOutcome::Success {
            save_path: saved.path,
            holdings_date: saved.date,
            n_holdings: saved.rows,
            attempts: outcome.attempts,
        },
        Err(e) => {
            warn!(
                item = %label,
                attempts = outcome.attempts,
                error_class = e.kind(),
                error = %e,
                "item failed"
            );
            ItemOutcome::Failure {
                error: error_chain(&e),
                error_class: e.kind().to_string(),
                attempts: outcome.attempts,
            }
        }
    }
}

/// Run every distinct key and collect one outcome per key.
///
/// Only building the worker pool can fail; item failures live in the report.
pub fn run_batch<'k, I>(
    keys: I,
    source: &dyn HoldingsSource,
    save: &SaveFn<'_>,
    options: &BatchOptions,
) -> Result<BatchReport, rayon::ThreadPoolBuildError>
where
    I: IntoIterator<Item = &'k QueryKey>,
{
    let keys: Vec<&QueryKey> = keys.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
    let threads = options.threads.max(1);
    info!(items = keys.len(), threads, "starting batch");

    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
    let outcomes: Vec<(QueryKey, ItemOutcome)> = pool.install(|| {
        keys.par_iter()
            .map(|key| ((*key).clone(), run_item(key, source, save, &options.retry)))
            .collect()
    });

    Ok(outcomes.into_iter().collect())
}
