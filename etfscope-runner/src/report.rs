//! Batch report: one outcome per requested `(ticker, date)` key.

use chrono::NaiveDate;
use etfscope_core::domain::QueryKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Terminal state of one batch item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemOutcome {
    Success {
        /// `None` when the save step skipped an already-persisted latest snapshot.
        save_path: Option<String>,
        holdings_date: NaiveDate,
        n_holdings: usize,
        attempts: u32,
    },
    Failure {
        /// Display of the error followed by its source chain.
        error: String,
        /// Variant name of the error, e.g. `UnsupportedQuery`.
        error_class: String,
        attempts: u32,
    },
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            ItemOutcome::Success { attempts, .. } | ItemOutcome::Failure { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn error_class(&self) -> Option<&str> {
        match self {
            ItemOutcome::Failure { error_class, .. } => Some(error_class),
            ItemOutcome::Success { .. } => None,
        }
    }
}

/// Flat JSON row: the query key followed by its outcome fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub ticker: String,
    pub query_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    items: BTreeMap<QueryKey, ItemOutcome>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: QueryKey, outcome: ItemOutcome) {
        self.items.insert(key, outcome);
    }

    pub fn get(&self, key: &QueryKey) -> Option<&ItemOutcome> {
        self.items.get(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QueryKey, &ItemOutcome)> {
        self.items.iter()
    }

    pub fn succeeded(&self) -> usize {
        self.items.values().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Successful items whose save step wrote nothing.
    pub fn skipped(&self) -> usize {
        self.items
            .values()
            .filter(|o| matches!(o, ItemOutcome::Success { save_path: None, .. }))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&QueryKey, &ItemOutcome)> {
        self.items.iter().filter(|(_, o)| !o.is_success())
    }

    /// Failure counts per error class, most frequent first.
    pub fn failure_classes(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for class in self.items.values().filter_map(ItemOutcome::error_class) {
            *counts.entry(class).or_default() += 1;
        }
        let mut classes: Vec<(String, usize)> =
            counts.into_iter().map(|(c, n)| (c.to_string(), n)).collect();
        classes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        classes
    }

    pub fn entries(&self) -> Vec<ReportEntry> {
        self.items
            .iter()
            .map(|(key, outcome)| ReportEntry {
                ticker: key.ticker.clone(),
                query_date: key.date,
                outcome: outcome.clone(),
            })
            .collect()
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries())
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json_pretty().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    pub fn log_summary(&self) {
        info!(
            items = self.len(),
            succeeded = self.succeeded(),
            skipped = self.skipped(),
            failed = self.failed(),
            "batch finished"
        );
        for (class, count) in self.failure_classes() {
            warn!(error_class = %class, count, "failures by class");
        }
        for (key, outcome) in self.failures() {
            if let ItemOutcome::Failure {
                error, attempts, ..
            } = outcome
            {
                warn!(item = %key, attempts, error = %error, "item failed");
            }
        }
    }
}

impl FromIterator<(QueryKey, ItemOutcome)> for BatchReport {
    fn from_iter<I: IntoIterator<Item = (QueryKey, ItemOutcome)>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample() -> BatchReport {
        [
            (
                QueryKey::new("IVV", Some(d(2022, 12, 30))),
                ItemOutcome::Success {
                    save_path: Some("out/IVV_2022_12_30.csv".into()),
                    holdings_date: d(2022, 12, 30),
                    n_holdings: 505,
                    attempts: 1,
                },
            ),
            (
                QueryKey::latest("QQQ"),
                ItemOutcome::Success {
                    save_path: None,
                    holdings_date: d(2023, 1, 13),
                    n_holdings: 101,
                    attempts: 2,
                },
            ),
            (
                QueryKey::new("SPY", Some(d(2022, 12, 30))),
                ItemOutcome::Failure {
                    error: "SSGA does not support this query: latest only".into(),
                    error_class: "UnsupportedQuery".into(),
                    attempts: 1,
                },
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn counts() {
        let r = sample();
        assert_eq!(r.len(), 3);
        assert_eq!(r.succeeded(), 2);
        assert_eq!(r.failed(), 1);
        assert_eq!(r.skipped(), 1);
        assert_eq!(r.failure_classes(), vec![("UnsupportedQuery".to_string(), 1)]);
        assert_eq!(
            r.get(&QueryKey::latest("QQQ")).map(ItemOutcome::attempts),
            Some(2)
        );
    }

    #[test]
    fn json_rows_are_flat() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json_pretty().unwrap()).unwrap();
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 3);

        let ivv = &rows[0];
        assert_eq!(ivv["ticker"], "IVV");
        assert_eq!(ivv["query_date"], "2022-12-30");
        assert_eq!(ivv["n_holdings"], 505);
        assert!(ivv.get("error").is_none());

        let qqq = &rows[1];
        assert!(qqq["query_date"].is_null());
        assert!(qqq["save_path"].is_null());

        let spy = &rows[2];
        assert_eq!(spy["error_class"], "UnsupportedQuery");
        assert!(spy.get("save_path").is_none());
    }

    #[test]
    fn entries_deserialize_back() {
        let r = sample();
        let rows: Vec<ReportEntry> = serde_json::from_str(&r.to_json_pretty().unwrap()).unwrap();
        assert_eq!(rows, r.entries());
    }
}
