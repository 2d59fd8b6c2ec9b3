//! Invesco holdings: plain CSV, no preamble.
//!
//! Equity and bond funds name the date and identifier columns differently
//! (`Date`/`PositionDate`, `Security Identifier`/`CUSIP`); exactly one of each
//! pair must be present.

use super::{warn_on_weight_sum, ParseError, ParsedHoldings, RawTable};
use crate::domain::HoldingsTable;
use crate::schema::{
    exactly_one_of, parse_date, Field, INVESCO_DATE_COLUMNS, INVESCO_FUND_TICKER_COLUMN,
    INVESCO_HOLDINGS, INVESCO_ID_COLUMNS,
};
use tracing::{debug, warn};

/// Parse an Invesco holdings CSV requested for `ticker`.
pub fn parse_holdings(ticker: &str, body: &str) -> Result<ParsedHoldings, ParseError> {
    let raw = RawTable::from_csv(body)?;
    INVESCO_HOLDINGS.check_required(&raw.header)?;

    let date_col = exactly_one_of(&raw.header, "as_of_date", INVESCO_DATE_COLUMNS)?;
    let id_col = exactly_one_of(&raw.header, "cusip", INVESCO_ID_COLUMNS)?;

    let date_idx = raw
        .column(&date_col)
        .ok_or_else(|| ParseError::missing_columns([date_col.clone()]))?;
    let mut dates = raw
        .distinct(date_idx)
        .iter()
        .map(|s| parse_date(s, INVESCO_HOLDINGS.date_format))
        .collect::<Result<Vec<_>, _>>()?;
    dates.sort();
    dates.dedup();
    let as_of_date = match dates.as_slice() {
        [d] => *d,
        [] => {
            return Err(ParseError::NoDataReturned(format!(
                "{ticker}: no rows with a holdings date"
            )))
        }
        many => {
            return Err(ParseError::MultipleValues {
                field: "holdings date",
                values: many.iter().map(|d| d.to_string()).collect(),
            })
        }
    };

    let reported_ticker = match raw.column(INVESCO_FUND_TICKER_COLUMN) {
        Some(idx) => {
            let tickers = raw.distinct(idx);
            if tickers.len() > 1 {
                return Err(ParseError::MultipleValues {
                    field: "fund ticker",
                    values: tickers,
                });
            }
            tickers.into_iter().next()
        }
        None => None,
    };
    if let Some(reported) = &reported_ticker {
        if !reported.eq_ignore_ascii_case(ticker) {
            warn!(requested = ticker, reported = %reported, "fund ticker mismatch");
        }
    }

    let mut table = HoldingsTable::new(ticker, as_of_date);
    let extra = [(date_col, Field::AsOfDate), (id_col, Field::Cusip)];
    let bindings = raw.bind(&INVESCO_HOLDINGS, &extra);
    table.holdings = raw.to_holdings(&bindings, &table.row(), INVESCO_HOLDINGS.date_format)?;

    debug!(fund = ticker, rows = table.len(), "parsed Invesco holdings");
    warn_on_weight_sum(&table);
    Ok(ParsedHoldings {
        table,
        reported_ticker,
        reported_product_id: None,
    })
}
