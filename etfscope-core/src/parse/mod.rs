//! Response parsers: one pure function per provider turning a raw body into a
//! [`HoldingsTable`] plus whatever identity the provider echoes back.
//!
//! Parsers never perform I/O and never swallow errors. Column layouts come from
//! the static tables in [`crate::schema`].

mod error;
pub mod invesco;
pub mod ishares;
pub mod listings;
pub mod sheet;
pub mod ssga;
pub mod table;
pub mod vanguard;

pub use error::ParseError;
pub use sheet::SheetCell;
pub use table::RawTable;

use crate::domain::{HoldingsTable, WEIGHT_SUM_TOLERANCE};
use std::fmt::Display;
use tracing::warn;

/// Parser output: the normalized table and the identity the response reported.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedHoldings {
    pub table: HoldingsTable,
    /// Fund ticker echoed by the response, when it carries one.
    pub reported_ticker: Option<String>,
    /// Provider-internal product id echoed by the response, when it carries one.
    pub reported_product_id: Option<String>,
}

impl ParsedHoldings {
    pub fn new(table: HoldingsTable) -> Self {
        Self {
            table,
            reported_ticker: None,
            reported_product_id: None,
        }
    }
}

/// Fail with [`ParseError::DataMismatch`] when a requested value disagrees with the response.
pub fn check_mismatch<T: PartialEq + Display>(
    field: &'static str,
    requested: &T,
    returned: &T,
) -> Result<(), ParseError> {
    if requested == returned {
        Ok(())
    } else {
        Err(ParseError::DataMismatch {
            field,
            requested: requested.to_string(),
            returned: returned.to_string(),
        })
    }
}

/// Log (never reject) tables whose weights stray from 100.
pub(crate) fn warn_on_weight_sum(table: &HoldingsTable) {
    if !table.is_empty() && !table.weights_balanced(100.0, WEIGHT_SUM_TOLERANCE) {
        warn!(
            fund = %table.fund_ticker,
            as_of = %table.as_of_date,
            total_weight = table.total_weight(),
            "holding weights do not sum to 100"
        );
    }
}
