//! Fetch Reconciler: which `(ticker, date)` pairs are not yet persisted.
//!
//! Only file names are inspected. Unparsable names are ignored, and so is the
//! extension, so a CSV file satisfies a query that would now be written as Parquet.

use crate::domain::QueryKey;
use crate::naming::parse_holdings_filename;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// The cross product `tickers × dates` minus pairs already present in `existing`.
pub fn missing_queries<I, S, T>(existing: I, dates: &[NaiveDate], tickers: &[T]) -> BTreeSet<QueryKey>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    T: AsRef<str>,
{
    let mut skipped = 0usize;
    let present: HashSet<(String, NaiveDate)> = existing
        .into_iter()
        .filter_map(|name| {
            let parsed = parse_holdings_filename(name.as_ref());
            if parsed.is_none() {
                skipped += 1;
            }
            parsed
        })
        .map(|f| (f.ticker, f.date))
        .collect();
    if skipped > 0 {
        debug!(skipped, "ignored files without a holdings name");
    }

    let mut missing = BTreeSet::new();
    for ticker in tickers {
        let ticker = ticker.as_ref();
        for date in dates {
            if !present.contains(&(ticker.to_string(), *date)) {
                missing.insert(QueryKey::new(ticker, Some(*date)));
            }
        }
    }
    debug!(
        present = present.len(),
        missing = missing.len(),
        "reconciled existing files"
    );
    missing
}
