use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single (ticker, date) request. `date == None` asks for the latest snapshot,
/// whose effective date is only known after the provider answers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryKey {
    pub ticker: String,
    pub date: Option<NaiveDate>,
}

impl QueryKey {
    pub fn new(ticker: impl Into<String>, date: Option<NaiveDate>) -> Self {
        Self {
            ticker: ticker.into(),
            date,
        }
    }

    pub fn latest(ticker: impl Into<String>) -> Self {
        Self::new(ticker, None)
    }

    pub fn is_latest(&self) -> bool {
        self.date.is_none()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.date {
            Some(d) => write!(f, "{}@{d}", self.ticker),
            None => write!(f, "{}@latest", self.ticker),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_ordering() {
        let a = QueryKey::latest("IVV");
        let b = QueryKey::new("IVV", NaiveDate::from_ymd_opt(2022, 12, 30));
        assert_eq!(a.to_string(), "IVV@latest");
        assert_eq!(b.to_string(), "IVV@2022-12-30");
        // None sorts before Some, so latest queries lead their ticker
        assert!(a < b);
        assert!(a.is_latest() && !b.is_latest());
    }
}
