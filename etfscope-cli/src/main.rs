//! etfscope CLI: listing snapshots, single holdings queries and batch scrapes.
//!
//! Commands:
//! - `listings`: fetch provider fund directories and save a CSV snapshot
//! - `holdings`: query one ticker and write its holdings as CSV to stdout
//! - `scrape`: plan, reconcile, fetch and save holdings for many tickers

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use etfscope_core::calendar::UsEquityCalendar;
use etfscope_core::domain::Provider;
use etfscope_core::listings::ListingDirectory;
use etfscope_core::planner::PlanOptions;
use etfscope_core::providers::ProviderRegistry;
use etfscope_core::{EtfScraper, HoldingsSource};
use etfscope_runner::{
    list_chunk, query_listings, scrape_holdings, OutputFormat, ScrapeConfig, ScrapeRequest,
    Storage,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "etfscope", about = "etfscope: ETF holdings scraper")]
struct Cli {
    /// Log level used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch provider fund directories and save them as a listings CSV.
    Listings {
        /// Providers to query (ishares, ssga, vanguard, invesco). Defaults to all.
        #[arg(long = "provider", value_delimiter = ',')]
        providers: Vec<String>,

        /// Output CSV path.
        #[arg(long, default_value = "listings.csv")]
        out: PathBuf,

        /// TOML config file (provider endpoints).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Query one ticker's holdings and print them as CSV.
    Holdings {
        #[arg(long)]
        ticker: String,

        /// As-of date (YYYY-MM-DD). Omit for the latest holdings.
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,

        /// Listings CSV. Without one, listings are fetched from every provider.
        #[arg(long)]
        listings: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Scrape holdings for many tickers and dates into a directory or bucket.
    Scrape {
        /// Tickers, comma separated.
        #[arg(long, value_delimiter = ',')]
        tickers: Vec<String>,

        /// File with one ticker per line; `#` starts a comment.
        #[arg(long)]
        ticker_file: Option<PathBuf>,

        /// First date (YYYY-MM-DD). Omit with --end for the latest holdings.
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,

        /// Last date (YYYY-MM-DD). Defaults to --start.
        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,

        /// Only query month ends.
        #[arg(long, default_value_t = false)]
        month_ends: bool,

        /// Only query exchange trading days.
        #[arg(long, default_value_t = false)]
        trading_days: bool,

        /// Re-fetch dates in range even if files exist.
        #[arg(long, default_value_t = false)]
        overwrite: bool,

        /// Local directory or gs://bucket/prefix.
        #[arg(long)]
        save_dir: Option<String>,

        /// Output format: csv or parquet.
        #[arg(long)]
        format: Option<OutputFormat>,

        /// Worker threads.
        #[arg(long)]
        threads: Option<usize>,

        /// Exchange calendar for --trading-days.
        #[arg(long)]
        exchange: Option<String>,

        /// Where to look for existing files. Defaults to --save-dir.
        #[arg(long)]
        existing_dir: Option<String>,

        #[arg(long)]
        config: Option<PathBuf>,

        /// Listings CSV. Without one, listings are fetched from every provider.
        #[arg(long)]
        listings: Option<PathBuf>,

        /// This task's index when the ticker list is split across tasks.
        #[arg(long, default_value_t = 0)]
        task_index: usize,

        #[arg(long, default_value_t = 1)]
        task_count: usize,

        /// Write the batch report as JSON.
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Listings {
            providers,
            out,
            config,
        } => run_listings(&providers, &out, config.as_deref()),
        Commands::Holdings {
            ticker,
            date,
            listings,
            config,
        } => run_holdings(&ticker, date, listings.as_deref(), config.as_deref()),
        Commands::Scrape {
            tickers,
            ticker_file,
            start,
            end,
            month_ends,
            trading_days,
            overwrite,
            save_dir,
            format,
            threads,
            exchange,
            existing_dir,
            config,
            listings,
            task_index,
            task_count,
            report,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(dir) = save_dir {
                cfg.scrape.save_dir = dir;
            }
            if existing_dir.is_some() {
                cfg.scrape.existing_dir = existing_dir;
            }
            if let Some(format) = format {
                cfg.scrape.format = format;
            }
            if let Some(threads) = threads {
                cfg.scrape.num_threads = threads;
            }
            if let Some(exchange) = exchange {
                cfg.scrape.exchange = exchange;
            }
            if listings.is_some() {
                cfg.scrape.listings_file = listings;
            }
            cfg.validate()?;

            let mut all_tickers = tickers;
            if let Some(path) = ticker_file {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading ticker file {}", path.display()))?;
                all_tickers.extend(read_tickers(&text));
            }
            let all_tickers = dedup_tickers(all_tickers);
            if all_tickers.is_empty() {
                bail!("no tickers given; use --tickers or --ticker-file");
            }
            let task_tickers = list_chunk(&all_tickers, task_index, task_count)?.to_vec();
            info!(
                task_index,
                task_count,
                tickers = task_tickers.len(),
                of = all_tickers.len(),
                "ticker split"
            );

            let mut request = ScrapeRequest::from_config(&cfg, task_tickers);
            request.start = start;
            request.end = end;
            request.plan = PlanOptions {
                month_ends,
                trading_days,
            };
            request.overwrite = overwrite;
            run_scrape(&cfg, &request, report.as_deref())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ScrapeConfig> {
    match path {
        Some(p) => ScrapeConfig::load(p).with_context(|| format!("loading config {}", p.display())),
        None => Ok(ScrapeConfig::default()),
    }
}

fn build_scraper(config: &ScrapeConfig, listings: Option<&Path>) -> Result<EtfScraper> {
    let registry = ProviderRegistry::with_settings(&config.providers)?;
    let directory = match listings.or(config.scrape.listings_file.as_deref()) {
        Some(path) => ListingDirectory::load_csv(path)
            .with_context(|| format!("loading listings {}", path.display()))?,
        None => {
            info!("no listings file given, fetching listings from every provider");
            ListingDirectory::new(query_listings(&registry, &Provider::ALL)?)
        }
    };
    info!(listings = directory.len(), "listing directory ready");
    Ok(EtfScraper::new(directory, registry))
}

fn run_listings(providers: &[String], out: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let providers: Vec<Provider> = if providers.is_empty() {
        Provider::ALL.to_vec()
    } else {
        providers
            .iter()
            .map(|p| p.parse::<Provider>())
            .collect::<Result<_, _>>()?
    };

    let registry = ProviderRegistry::with_settings(&config.providers)?;
    let directory = ListingDirectory::new(query_listings(&registry, &providers)?);
    directory
        .save_csv(out)
        .with_context(|| format!("writing {}", out.display()))?;
    println!("Saved {} listings to {}", directory.len(), out.display());
    Ok(())
}

fn run_holdings(
    ticker: &str,
    date: Option<NaiveDate>,
    listings: Option<&Path>,
    config: Option<&Path>,
) -> Result<()> {
    let config = load_config(config)?;
    let scraper = build_scraper(&config, listings)?;
    let table = scraper
        .query_holdings(ticker, date)
        .with_context(|| format!("querying holdings for {ticker}"))?;

    let bytes = OutputFormat::Csv.encode(&table)?;
    std::io::stdout().lock().write_all(&bytes)?;
    Ok(())
}

fn run_scrape(config: &ScrapeConfig, request: &ScrapeRequest, report_path: Option<&Path>) -> Result<()> {
    let scraper = build_scraper(config, None)?;
    let storage = Storage::new(&config.storage)?;
    let report = scrape_holdings(request, &scraper, &storage, &UsEquityCalendar)?;

    if let Some(path) = report_path {
        report
            .write_json(path)
            .with_context(|| format!("writing report {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }
    println!(
        "{} queried, {} saved, {} skipped, {} failed",
        report.len(),
        report.succeeded() - report.skipped(),
        report.skipped(),
        report.failed()
    );
    Ok(())
}

/// One ticker per line; blank lines and `#` comments are ignored.
fn read_tickers(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.split('#').next().unwrap_or("").trim())
        .filter(|l| !l.is_empty())
        .map(|l| l.to_uppercase())
        .collect()
}

/// Drop repeats, keeping first occurrence order.
fn dedup_tickers(tickers: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tickers
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}
