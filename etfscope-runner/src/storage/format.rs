//! Output encodings for a holdings table.

use super::StorageError;
use etfscope_core::domain::{HoldingsTable, HOLDING_COLUMNS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "text/csv",
            OutputFormat::Parquet => "application/vnd.apache.parquet",
        }
    }

    pub fn encode(&self, table: &HoldingsTable) -> Result<Vec<u8>, StorageError> {
        match self {
            OutputFormat::Csv => encode_csv(table),
            OutputFormat::Parquet => encode_parquet(table),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "parquet" | "pq" => Ok(OutputFormat::Parquet),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

// ── CSV ──

/// Header is always written, so an empty table still yields a valid file.
fn encode_csv(table: &HoldingsTable) -> Result<Vec<u8>, StorageError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(vec![]);
    writer.write_record(HOLDING_COLUMNS)?;
    for holding in table.iter() {
        writer.serialize(holding)?;
    }
    writer
        .into_inner()
        .map_err(|e| StorageError::io("csv buffer", e.into_error()))
}

// ── Parquet ──

#[cfg(feature = "parquet")]
fn encode_parquet(table: &HoldingsTable) -> Result<Vec<u8>, StorageError> {
    let mut df = parquet::holdings_frame(table)?;
    let mut bytes = Vec::new();
    polars::prelude::ParquetWriter::new(&mut bytes)
        .finish(&mut df)
        .map_err(|e| StorageError::Parquet(format!("write parquet: {e}")))?;
    Ok(bytes)
}

#[cfg(not(feature = "parquet"))]
fn encode_parquet(_table: &HoldingsTable) -> Result<Vec<u8>, StorageError> {
    Err(StorageError::MissingDependency {
        format: "parquet",
        feature: "parquet",
    })
}

#[cfg(feature = "parquet")]
pub(crate) mod parquet {
    use super::StorageError;
    use chrono::NaiveDate;
    use etfscope_core::domain::{FundHolding, HoldingsTable};
    use polars::prelude::*;

    fn epoch_days(d: NaiveDate) -> i32 {
        (d - NaiveDate::default()).num_days() as i32
    }

    fn text(name: &str, rows: &[FundHolding], get: fn(&FundHolding) -> Option<&str>) -> Column {
        let values: Vec<Option<&str>> = rows.iter().map(get).collect();
        Column::new(name.into(), values)
    }

    fn number(name: &str, rows: &[FundHolding], get: fn(&FundHolding) -> Option<f64>) -> Column {
        let values: Vec<Option<f64>> = rows.iter().map(get).collect();
        Column::new(name.into(), values)
    }

    fn date(
        name: &str,
        rows: &[FundHolding],
        get: fn(&FundHolding) -> Option<NaiveDate>,
    ) -> Result<Column, StorageError> {
        let values: Vec<Option<i32>> = rows.iter().map(|h| get(h).map(epoch_days)).collect();
        Column::new(name.into(), values)
            .cast(&DataType::Date)
            .map_err(|e| StorageError::Parquet(format!("{name} cast: {e}")))
    }

    /// One column per canonical holding field, in output order.
    pub fn holdings_frame(table: &HoldingsTable) -> Result<DataFrame, StorageError> {
        let rows = table.holdings.as_slice();
        DataFrame::new(vec![
            text("fund_ticker", rows, |h| Some(h.fund_ticker.as_str())),
            date("as_of_date", rows, |h| Some(h.as_of_date))?,
            text("ticker", rows, |h| h.ticker.as_deref()),
            text("isin", rows, |h| h.isin.as_deref()),
            text("sedol", rows, |h| h.sedol.as_deref()),
            text("cusip", rows, |h| h.cusip.as_deref()),
            text("name", rows, |h| h.name.as_deref()),
            number("amount", rows, |h| h.amount),
            number("weight", rows, |h| h.weight),
            text("security_type", rows, |h| h.security_type.as_deref()),
            text("sector", rows, |h| h.sector.as_deref()),
            text("asset_class", rows, |h| h.asset_class.as_deref()),
            number("market_value", rows, |h| h.market_value),
            number("notional_value", rows, |h| h.notional_value),
            number("price", rows, |h| h.price),
            text("location", rows, |h| h.location.as_deref()),
            text("exchange", rows, |h| h.exchange.as_deref()),
            text("currency", rows, |h| h.currency.as_deref()),
            number("fx_rate", rows, |h| h.fx_rate),
            text("market_currency", rows, |h| h.market_currency.as_deref()),
            number("duration", rows, |h| h.duration),
            number("modified_duration", rows, |h| h.modified_duration),
            number("coupon", rows, |h| h.coupon),
            date("maturity", rows, |h| h.maturity)?,
            number("ytm", rows, |h| h.ytm),
            number("yield_to_worst", rows, |h| h.yield_to_worst),
            number("yield_to_call", rows, |h| h.yield_to_call),
            number("real_duration", rows, |h| h.real_duration),
            number("real_ytm", rows, |h| h.real_ytm),
            date("accrual_date", rows, |h| h.accrual_date)?,
            date("effective_date", rows, |h| h.effective_date)?,
        ])
        .map_err(|e| StorageError::Parquet(format!("dataframe creation: {e}")))
    }
}
