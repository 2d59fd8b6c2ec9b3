//! End-to-end scrape: plan dates, reconcile against persisted files, fetch and save.

use crate::config::ScrapeConfig;
use crate::orchestrator::{run_batch, BatchOptions};
use crate::report::BatchReport;
use crate::storage::{Destination, OutputFormat, Storage, StorageError};
use chrono::NaiveDate;
use etfscope_core::calendar::{CalendarError, TradingCalendar};
use etfscope_core::domain::{HoldingsTable, Provider, QueryKey, SecurityListing};
use etfscope_core::naming::holdings_filename;
use etfscope_core::planner::{plan_dates, PlanOptions};
use etfscope_core::providers::ProviderRegistry;
use etfscope_core::reconcile::missing_queries;
use etfscope_core::{FetchError, HoldingsSource};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid query range: {0}")]
    InvalidRange(String),

    #[error("invalid task split: index {index} of {count}")]
    InvalidTask { index: usize, count: usize },

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("cannot build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

// ── Query dates ──

/// Turn the user's range into query dates. `[None]` means "latest".
///
/// - no start, no end → `[None]`
/// - end without start, or overwrite without start → [`ScrapeError::InvalidRange`]
/// - start without end → a single-day range
pub fn parse_query_dates(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    options: PlanOptions,
    overwrite: bool,
    exchange: &str,
    calendar: &dyn TradingCalendar,
) -> Result<Vec<Option<NaiveDate>>, ScrapeError> {
    let Some(start) = start else {
        if let Some(end) = end {
            return Err(ScrapeError::InvalidRange(format!(
                "end date {end} given without a start date"
            )));
        }
        if overwrite {
            return Err(ScrapeError::InvalidRange(
                "overwrite needs a start date to know what to replace".into(),
            ));
        }
        return Ok(vec![None]);
    };

    let end = end.unwrap_or_else(|| {
        warn!(%start, "no end date given, querying the start date only");
        start
    });
    let dates = plan_dates(start, end, options, exchange, calendar)?;
    Ok(dates.into_iter().map(Some).collect())
}

// ── Sharding ──

/// Block `task_index` of `task_count` contiguous blocks of `ceil(len / task_count)`.
pub fn list_chunk<T>(items: &[T], task_index: usize, task_count: usize) -> Result<&[T], ScrapeError> {
    if task_count == 0 || task_index >= task_count {
        return Err(ScrapeError::InvalidTask {
            index: task_index,
            count: task_count,
        });
    }
    let size = items.len().div_ceil(task_count);
    let start = (task_index * size).min(items.len());
    let end = (start + size).min(items.len());
    Ok(&items[start..end])
}

// ── Listings ──

/// Fetch several providers' listings in parallel, concatenated in `providers` order.
pub fn query_listings(
    registry: &ProviderRegistry,
    providers: &[Provider],
) -> Result<Vec<SecurityListing>, ScrapeError> {
    if providers.is_empty() {
        return Ok(Vec::new());
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(providers.len())
        .build()?;
    let results: Vec<Result<Vec<SecurityListing>, FetchError>> = pool.install(|| {
        providers
            .par_iter()
            .map(|p| {
                let listings = registry.get(*p)?.fetch_listings()?;
                info!(provider = %p, listings = listings.len(), "fetched listings");
                Ok(listings)
            })
            .collect()
    });

    let mut all = Vec::new();
    for listings in results {
        all.extend(listings?);
    }
    Ok(all)
}

// ── Scrape ──

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeRequest {
    pub tickers: Vec<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub plan: PlanOptions,
    /// Re-fetch everything in range, ignoring persisted files.
    pub overwrite: bool,
    pub save_dir: String,
    pub existing_dir: Option<String>,
    pub format: OutputFormat,
    pub exchange: String,
    pub batch: BatchOptions,
}

impl ScrapeRequest {
    /// A "latest holdings" request using the config's storage and batch settings.
    pub fn from_config(config: &ScrapeConfig, tickers: Vec<String>) -> Self {
        Self {
            tickers,
            start: None,
            end: None,
            plan: PlanOptions::default(),
            overwrite: false,
            save_dir: config.scrape.save_dir.clone(),
            existing_dir: config.scrape.existing_dir.clone(),
            format: config.scrape.format,
            exchange: config.scrape.exchange.clone(),
            batch: BatchOptions {
                threads: config.scrape.num_threads,
                retry: config.retry.policy(),
            },
        }
    }
}

/// Query keys still to fetch given what is already persisted.
pub fn pending_queries(
    request: &ScrapeRequest,
    query_dates: &[Option<NaiveDate>],
    existing: &[String],
) -> BTreeSet<QueryKey> {
    if query_dates == [None] {
        info!(tickers = request.tickers.len(), "querying latest holdings");
        return request.tickers.iter().map(QueryKey::latest).collect();
    }

    let dates: Vec<NaiveDate> = query_dates.iter().flatten().copied().collect();
    let pending = missing_queries(existing, &dates, &request.tickers);
    if pending.is_empty() {
        info!(save_dir = %request.save_dir, "nothing to query, requested files already exist");
    } else {
        let tickers: HashSet<&str> = pending.iter().map(|k| k.ticker.as_str()).collect();
        info!(
            queries = pending.len(),
            dates = dates.len(),
            tickers = tickers.len(),
            "querying missing holdings"
        );
    }
    pending
}

pub fn scrape_holdings(
    request: &ScrapeRequest,
    source: &dyn HoldingsSource,
    storage: &Storage,
    calendar: &dyn TradingCalendar,
) -> Result<BatchReport, ScrapeError> {
    let query_dates = parse_query_dates(
        request.start,
        request.end,
        request.plan,
        request.overwrite,
        &request.exchange,
        calendar,
    )?;
    if query_dates.is_empty() {
        info!(
            start = ?request.start,
            end = ?request.end,
            month_ends = request.plan.month_ends,
            trading_days = request.plan.trading_days,
            exchange = %request.exchange,
            "no dates to query in range"
        );
        return Ok(BatchReport::new());
    }

    let save_dest = Destination::parse(&request.save_dir)?;
    let existing: Vec<String> = if request.overwrite {
        warn!(save_dir = %save_dest, "overwriting existing files");
        Vec::new()
    } else {
        let existing_dir = request.existing_dir.as_deref().unwrap_or(&request.save_dir);
        storage.list(&Destination::parse(existing_dir)?, request.format.extension())?
    };

    let pending = pending_queries(request, &query_dates, &existing);
    let existing_names: HashSet<&str> = existing
        .iter()
        .filter_map(|p| p.rsplit(['/', '\\']).next())
        .collect();

    let format = request.format;
    let save = |table: &HoldingsTable,
                ticker: &str,
                date: NaiveDate|
     -> Result<Option<String>, StorageError> {
        let name = holdings_filename(ticker, date, format.extension());
        if existing_names.contains(name.as_str()) {
            info!(ticker, %date, file = %name, "already saved, skipping");
            return Ok(None);
        }
        storage.save(table, ticker, date, &save_dest, format).map(Some)
    };

    let report = run_batch(&pending, source, &save, &request.batch)?;
    report.log_summary();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use etfscope_core::calendar::UsEquityCalendar;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dates(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        overwrite: bool,
    ) -> Result<Vec<Option<NaiveDate>>, ScrapeError> {
        parse_query_dates(start, end, PlanOptions::default(), overwrite, "NYSE", &UsEquityCalendar)
    }

    #[test]
    fn no_range_means_latest() {
        assert_eq!(dates(None, None, false).unwrap(), vec![None]);
    }

    #[test]
    fn end_or_overwrite_without_start_is_rejected() {
        assert!(matches!(dates(None, Some(d(2022, 12, 30)), false), Err(ScrapeError::InvalidRange(_))));
        assert!(matches!(dates(None, None, true), Err(ScrapeError::InvalidRange(_))));
    }

    #[test]
    fn start_without_end_is_one_day() {
        assert_eq!(dates(Some(d(2022, 12, 30)), None, false).unwrap(), vec![Some(d(2022, 12, 30))]);
        // a Saturday plans nothing
        assert!(dates(Some(d(2022, 12, 31)), None, true).unwrap().is_empty());
    }

    #[test]
    fn unknown_exchange_surfaces() {
        let options = PlanOptions {
            month_ends: false,
            trading_days: true,
        };
        let err = parse_query_dates(
            Some(d(2022, 12, 1)),
            Some(d(2022, 12, 30)),
            options,
            false,
            "XLON",
            &UsEquityCalendar,
        )
        .unwrap_err();
        assert!(matches!(err, ScrapeError::Calendar(CalendarError::UnknownExchange(_))));
    }

    #[test]
    fn chunks_are_contiguous_blocks() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(list_chunk(&items, 0, 3).unwrap(), &[0, 1, 2, 3]);
        assert_eq!(list_chunk(&items, 1, 3).unwrap(), &[4, 5, 6, 7]);
        assert_eq!(list_chunk(&items, 2, 3).unwrap(), &[8, 9]);
        assert_eq!(list_chunk(&items, 0, 1).unwrap(), items.as_slice());
        assert!(list_chunk(&[] as &[u32], 0, 4).unwrap().is_empty());
        assert!(list_chunk(&items, 3, 3).is_err());
        assert!(list_chunk(&items, 0, 0).is_err());
    }

    #[test]
    fn more_tasks_than_items_leaves_trailing_tasks_empty() {
        let items = ["IVV", "QQQ"];
        assert_eq!(list_chunk(&items, 0, 5).unwrap(), &["IVV"]);
        assert_eq!(list_chunk(&items, 1, 5).unwrap(), &["QQQ"]);
        assert!(list_chunk(&items, 4, 5).unwrap().is_empty());
    }

    #[test]
    fn latest_queries_expand_tickers() {
        let request = ScrapeRequest::from_config(&ScrapeConfig::default(), vec!["IVV".into(), "QQQ".into()]);
        let pending = pending_queries(&request, &[None], &["IVV_2023_01_13.csv".to_string()]);
        assert_eq!(
            pending.into_iter().collect::<Vec<_>>(),
            vec![QueryKey::latest("IVV"), QueryKey::latest("QQQ")]
        );
    }

    #[test]
    fn empty_provider_list_fetches_nothing() {
        assert!(query_listings(&ProviderRegistry::new(), &[]).unwrap().is_empty());
        assert!(matches!(
            query_listings(&ProviderRegistry::new(), &[Provider::Vanguard]),
            Err(ScrapeError::Fetch(FetchError::UnknownProvider(Provider::Vanguard)))
        ));
    }
}
