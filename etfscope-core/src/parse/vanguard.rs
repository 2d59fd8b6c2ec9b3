//! Vanguard holding-details JSON.
//!
//! The endpoint answers with a single-element array:
//! `[{"portId": "0968", "holdingDetailItem": [{...}, ...]}]`.

use super::{check_mismatch, warn_on_weight_sum, ParseError, ParsedHoldings, RawTable};
use crate::domain::HoldingsTable;
use crate::schema::{parse_date, VANGUARD_HOLDINGS};
use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::debug;

const DATE_COLUMN: &str = "effectiveDate";

/// Parse a Vanguard response requested for `product_id` as of `requested_date`.
///
/// Rows are tagged with `fund_ticker`; the response itself only carries the product id.
pub fn parse_holdings(
    fund_ticker: &str,
    product_id: &str,
    requested_date: NaiveDate,
    body: &str,
) -> Result<ParsedHoldings, ParseError> {
    let value: Value = serde_json::from_str(body)?;
    let items = value
        .as_array()
        .ok_or_else(|| ParseError::UnexpectedShape("expected a JSON array".into()))?;

    let entry = match items.as_slice() {
        [] => {
            return Err(ParseError::NoDataReturned(format!(
                "empty response for product {product_id} on {requested_date}"
            )))
        }
        [one] => one,
        many => {
            return Err(ParseError::UnexpectedShape(format!(
                "expected one top-level element, found {}",
                many.len()
            )))
        }
    };

    let returned_id = entry
        .get("portId")
        .and_then(scalar)
        .ok_or_else(|| ParseError::UnexpectedShape("missing portId".into()))?;
    check_mismatch("product id", &product_id.to_string(), &returned_id)?;

    let records = entry
        .get("holdingDetailItem")
        .and_then(Value::as_array)
        .ok_or_else(|| ParseError::UnexpectedShape("missing holdingDetailItem list".into()))?;
    if records.is_empty() {
        return Err(ParseError::NoDataReturned(format!(
            "no holding records for product {product_id} on {requested_date}"
        )));
    }

    let raw = records_to_table(records)?;
    VANGUARD_HOLDINGS.check_required(&raw.header)?;

    let as_of_date = single_date(&raw)?;
    check_mismatch("holdings date", &requested_date, &as_of_date)?;

    let mut table = HoldingsTable::new(fund_ticker, as_of_date);
    let bindings = raw.bind(&VANGUARD_HOLDINGS, &[]);
    table.holdings = raw.to_holdings(&bindings, &table.row(), VANGUARD_HOLDINGS.date_format)?;

    debug!(fund = fund_ticker, product_id, rows = table.len(), "parsed Vanguard holdings");
    warn_on_weight_sum(&table);
    Ok(ParsedHoldings {
        table,
        reported_ticker: None,
        reported_product_id: Some(returned_id),
    })
}

/// Flatten a list of JSON objects into a table keyed by the union of their fields.
fn records_to_table(records: &[Value]) -> Result<RawTable, ParseError> {
    let objects: Vec<&Map<String, Value>> = records
        .iter()
        .map(|r| {
            r.as_object()
                .ok_or_else(|| ParseError::UnexpectedShape("holding record is not an object".into()))
        })
        .collect::<Result<_, _>>()?;

    let mut header: Vec<String> = Vec::new();
    for obj in &objects {
        for key in obj.keys() {
            if !header.contains(key) {
                header.push(key.clone());
            }
        }
    }

    let rows = objects
        .iter()
        .map(|obj| header.iter().map(|k| obj.get(k).and_then(scalar)).collect())
        .collect();
    Ok(RawTable::new(header, rows))
}

fn scalar(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn single_date(raw: &RawTable) -> Result<NaiveDate, ParseError> {
    let col = raw
        .column(DATE_COLUMN)
        .ok_or_else(|| ParseError::missing_columns([DATE_COLUMN]))?;
    let mut dates = raw
        .distinct(col)
        .iter()
        .map(|s| parse_date(s, VANGUARD_HOLDINGS.date_format))
        .collect::<Result<Vec<_>, _>>()?;
    dates.sort();
    dates.dedup();
    match dates.as_slice() {
        [d] => Ok(*d),
        [] => Err(ParseError::NoDataReturned(format!("no {DATE_COLUMN} values"))),
        many => Err(ParseError::MultipleValues {
            field: "holdings date",
            values: many.iter().map(|d| d.to_string()).collect(),
        }),
    }
}
