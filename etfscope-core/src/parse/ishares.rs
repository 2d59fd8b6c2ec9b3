//! iShares holdings: a fixed-height preamble followed by CSV.
//!
//! ```text
//! iShares Core S&P 500 ETF
//! Fund Holdings as of,"Dec 30, 2022"
//! ...                                  (9 preamble lines, the last is a lone NBSP)
//! Ticker,Name,Sector,...               (CSV header)
//! ```
//!
//! The endpoint occasionally emits the whole document twice in one response.
//! The second copy starts with a row repeating the preamble's first line, and
//! everything from that row on is discarded.

use super::{warn_on_weight_sum, ParseError, ParsedHoldings, RawTable};
use crate::domain::HoldingsTable;
use crate::schema::{parse_date, ColumnMap, ISHARES_EQUITY, ISHARES_FIXED_INCOME};
use tracing::{debug, info, warn};

pub const PREAMBLE_LINES: usize = 9;
const DATE_MARKER: &str = "fund holdings as of";
const NO_DATA_SENTINEL: &str = "-";
const PREAMBLE_TERMINATOR: &str = "\u{a0}";
const DATE_FORMAT: &str = "%b %d, %Y";

/// Which holdings layout a fund publishes, chosen from its listing asset class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Equity, real estate and commodity funds.
    Equity,
    FixedIncome,
}

impl Layout {
    pub fn for_asset_class(asset_class: Option<&str>) -> Self {
        match asset_class.map(|a| a.trim().to_ascii_lowercase()) {
            Some(a) if a == "fixed income" || a == "fixed_income" => Layout::FixedIncome,
            _ => Layout::Equity,
        }
    }

    pub fn columns(&self) -> &'static ColumnMap {
        match self {
            Layout::Equity => &ISHARES_EQUITY,
            Layout::FixedIncome => &ISHARES_FIXED_INCOME,
        }
    }
}

/// Parse an iShares holdings CSV for `fund_ticker`.
pub fn parse_holdings(
    fund_ticker: &str,
    body: &str,
    asset_class: Option<&str>,
) -> Result<ParsedHoldings, ParseError> {
    let body = body.trim_start_matches('\u{feff}');
    let mut parts = body.splitn(PREAMBLE_LINES + 1, '\n');
    let preamble: Vec<&str> = parts
        .by_ref()
        .take(PREAMBLE_LINES)
        .map(|l| l.trim_end_matches('\r'))
        .collect();
    let csv_body = parts.next().ok_or_else(|| {
        ParseError::UnexpectedShape(format!(
            "expected a {PREAMBLE_LINES}-line preamble before the holdings CSV"
        ))
    })?;

    let as_of_date = {
        let raw = date_marker(&preamble)?;
        if raw == NO_DATA_SENTINEL {
            return Err(ParseError::NoDataReturned(format!(
                "{fund_ticker}: holdings date reported as '{NO_DATA_SENTINEL}'"
            )));
        }
        info!(fund = fund_ticker, reported = raw, "found reported holdings date");
        parse_date(raw, DATE_FORMAT)?
    };

    if preamble.last() != Some(&PREAMBLE_TERMINATOR) {
        warn!(
            fund = fund_ticker,
            found = ?preamble.last(),
            "unexpected last line in the preamble block"
        );
    }

    let layout = Layout::for_asset_class(asset_class);
    let columns = layout.columns();

    let mut raw = RawTable::from_csv(csv_body)?;
    columns.check_required(&raw.header)?;

    let intro = first_field(preamble[0]);
    if !intro.is_empty() {
        if let Some(cutoff) = raw.find_row_starting_with(intro) {
            warn!(
                fund = fund_ticker,
                kept = cutoff,
                dropped = raw.len() - cutoff,
                "response repeats its content block, keeping the first copy"
            );
            raw.truncate(cutoff);
        }
    }

    // Rows without a weight are footers and placeholders.
    if let Some(weight_col) = raw.column("Weight (%)") {
        raw.retain_present(weight_col);
    }

    let mut table = HoldingsTable::new(fund_ticker, as_of_date);
    let bindings = raw.bind(columns, &[]);
    table.holdings = raw.to_holdings(&bindings, &table.row(), columns.date_format)?;

    debug!(fund = fund_ticker, ?layout, rows = table.len(), "parsed iShares holdings");
    warn_on_weight_sum(&table);
    Ok(ParsedHoldings::new(table))
}

/// The single distinct "Fund Holdings as of" value in the preamble.
fn date_marker<'a>(preamble: &[&'a str]) -> Result<&'a str, ParseError> {
    let mut values: Vec<&str> = preamble
        .iter()
        .filter(|l| l.to_lowercase().contains(DATE_MARKER))
        .map(|l| {
            l.split_once(',')
                .map_or(*l, |(_, v)| v)
                .trim()
                .trim_matches(|c| c == '"' || c == '\'')
        })
        .collect();
    values.sort_unstable();
    values.dedup();
    match values.as_slice() {
        [one] => Ok(*one),
        _ => Err(ParseError::MissingDateMarker {
            found: values.len(),
        }),
    }
}

fn first_field(line: &str) -> &str {
    line.split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('"')
}
