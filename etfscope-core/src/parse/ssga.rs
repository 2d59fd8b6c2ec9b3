//! SSGA daily holdings spreadsheet.
//!
//! Rows above the `Name` header row form a key/value preamble:
//!
//! ```text
//! Fund Name:      | SPDR S&P 500 ETF Trust
//! Ticker Symbol:  | SPY
//! Holdings:       | As of 10-Jan-2023
//! <blank>
//! Name | Ticker | Identifier | SEDOL | Weight | Sector | Shares Held | Local Currency
//! ```

use super::{sheet, warn_on_weight_sum, ParseError, ParsedHoldings, RawTable, SheetCell};
use crate::domain::HoldingsTable;
use crate::schema::{parse_date, SSGA_HOLDINGS};
use std::collections::HashMap;
use tracing::{debug, info};

const HEADER_TITLE: &str = "Name";
const TICKER_KEY: &str = "Ticker Symbol";
const HOLDINGS_KEY: &str = "Holdings";
const AS_OF: &str = "as of";

/// Decode and parse an SSGA holdings workbook requested for `ticker`.
pub fn parse_holdings(ticker: &str, bytes: &[u8]) -> Result<ParsedHoldings, ParseError> {
    let grid = sheet::read_first_sheet(bytes)?;
    parse_grid(ticker, &grid)
}

/// Parse an already-decoded cell grid.
pub fn parse_grid(ticker: &str, grid: &[Vec<SheetCell>]) -> Result<ParsedHoldings, ParseError> {
    let header_row = grid
        .iter()
        .position(|r| matches!(r.first(), Some(SheetCell::Text(s)) if s.trim() == HEADER_TITLE))
        .ok_or_else(|| {
            ParseError::UnexpectedShape(format!("no row starts with '{HEADER_TITLE}'"))
        })?;

    let preamble = preamble(&grid[..header_row]);
    let reported = preamble
        .get(TICKER_KEY)
        .cloned()
        .ok_or_else(|| ParseError::MissingPreambleField(TICKER_KEY.into()))?;
    let holdings_text = preamble
        .get(HOLDINGS_KEY)
        .ok_or_else(|| ParseError::MissingPreambleField(HOLDINGS_KEY.into()))?;
    let as_of_date = as_of_date(holdings_text)?;
    info!(fund = ticker, %as_of_date, "found response as of date");

    if !reported.eq_ignore_ascii_case(ticker) {
        return Err(ParseError::TickerMismatch {
            requested: ticker.to_string(),
            returned: reported,
        });
    }

    let header: Vec<String> = grid[header_row]
        .iter()
        .map(|c| c.as_string().unwrap_or_default())
        .collect();
    let rows = grid[header_row + 1..]
        .iter()
        .map(|r| r.iter().map(SheetCell::as_string).collect())
        .collect();
    let mut raw = RawTable::new(header, rows);
    SSGA_HOLDINGS.check_required(&raw.header)?;

    if let Some(ticker_col) = raw.column("Ticker") {
        raw.retain_identified(ticker_col);
    }

    let mut table = HoldingsTable::new(ticker, as_of_date);
    let bindings = raw.bind(&SSGA_HOLDINGS, &[]);
    table.holdings = raw.to_holdings(&bindings, &table.row(), SSGA_HOLDINGS.date_format)?;

    debug!(fund = ticker, rows = table.len(), "parsed SSGA holdings");
    warn_on_weight_sum(&table);
    Ok(ParsedHoldings {
        table,
        reported_ticker: Some(reported),
        reported_product_id: None,
    })
}

/// First two columns above the header, keys with trailing colons removed.
fn preamble(rows: &[Vec<SheetCell>]) -> HashMap<String, String> {
    rows.iter()
        .filter_map(|r| {
            let key = r.first()?.as_string()?;
            let value = r.get(1)?.as_string()?;
            Some((key.trim_end_matches(':').trim().to_string(), value))
        })
        .collect()
}

/// "As of 10-Jan-2023" → 2023-01-10.
fn as_of_date(text: &str) -> Result<chrono::NaiveDate, ParseError> {
    let lowered = text.to_lowercase();
    let tail = lowered
        .rsplit(AS_OF)
        .next()
        .unwrap_or_default()
        .trim();
    parse_date(tail, SSGA_HOLDINGS.date_format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::parse::SheetCell::{Empty, Number};

    fn t(s: &str) -> SheetCell {
        SheetCell::text(s)
    }

    fn grid(reported: &str) -> Vec<Vec<SheetCell>> {
        vec![
            vec![t("Fund Name:"), t("SPDR Test ETF")],
            vec![t("Ticker Symbol:"), t(reported)],
            vec![t("Holdings:"), t("As of 10-Jan-2023")],
            vec![Empty, Empty],
            vec![
                t("Name"),
                t("Ticker"),
                t("Identifier"),
                t("SEDOL"),
                t("Weight"),
                t("Sector"),
                t("Shares Held"),
                t("Local Currency"),
            ],
            vec![
                t("APPLE INC"),
                t("AAPL"),
                t("037833100"),
                t("2046251"),
                Number(70.5),
                t("Information Technology"),
                Number(1500.0),
                t("USD"),
            ],
            vec![
                t("EXXON MOBIL CORP"),
                t("XOM"),
                t("30231G102"),
                t("2326618"),
                Number(29.5),
                t("Energy"),
                Number(2500.0),
                t("USD"),
            ],
            vec![
                t("US DOLLAR"),
                t("-"),
                t("-"),
                t("-"),
                t("-"),
                t("-"),
                t("-"),
                t("USD"),
            ],
            vec![Empty],
            vec![t("Past performance is not a guarantee of future results.")],
        ]
    }

    #[test]
    fn parses_preamble_and_rows() {
        let parsed = parse_grid("tst", &grid("TST")).unwrap();
        let table = parsed.table;
        assert_eq!(table.as_of_date, NaiveDate::from_ymd_opt(2023, 1, 10).unwrap());
        assert_eq!(parsed.reported_ticker.as_deref(), Some("TST"));
        assert_eq!(table.len(), 2);
        assert_eq!(table.total_amount(), 4000.0);
        assert!((table.total_weight() - 100.0).abs() < 1e-9);
        assert_eq!(table.first_ticker(), Some("AAPL"));
        assert_eq!(table.last_ticker(), Some("XOM"));
        assert_eq!(table.holdings[0].cusip.as_deref(), Some("037833100"));
        assert_eq!(table.holdings[1].currency.as_deref(), Some("USD"));
    }

    #[test]
    fn ticker_mismatch_is_rejected() {
        let err = parse_grid("SPY", &grid("SPYG")).unwrap_err();
        assert!(matches!(err, ParseError::TickerMismatch { .. }));
    }

    #[test]
    fn missing_header_row() {
        let g = vec![vec![t("Ticker Symbol:"), t("TST")]];
        assert!(matches!(
            parse_grid("TST", &g),
            Err(ParseError::UnexpectedShape(_))
        ));
    }

    #[test]
    fn as_of_text_variants() {
        let d = NaiveDate::from_ymd_opt(2023, 1, 10).unwrap();
        assert_eq!(as_of_date("As of 10-Jan-2023").unwrap(), d);
        assert_eq!(as_of_date("Holdings as of 10-JAN-2023 ").unwrap(), d);
        assert!(as_of_date("unknown").is_err());
    }
}
