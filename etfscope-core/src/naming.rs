//! Persisted file naming: `{ticker}_{YYYY_MM_DD}.{ext}`.
//!
//! The name is the only state the reconciler reads back, so encoding and
//! parsing must round-trip for any ticker, including ones with punctuation.

use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y_%m_%d";

/// `_` + `YYYY_MM_DD`
const DATE_SUFFIX_LEN: usize = 11;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HoldingsFile {
    pub ticker: String,
    pub date: NaiveDate,
    /// Extension without the leading dot.
    pub extension: String,
}

pub fn holdings_filename(ticker: &str, date: NaiveDate, extension: &str) -> String {
    format!(
        "{ticker}_{}.{}",
        date.format(DATE_FORMAT),
        extension.trim_start_matches('.')
    )
}

/// Parse a path or object URI whose final segment follows [`holdings_filename`].
///
/// The date is read from the last eleven characters before the extension, so a
/// ticker may itself contain dots or underscores. Anything else yields `None`.
pub fn parse_holdings_filename(path: &str) -> Option<HoldingsFile> {
    let name = path.rsplit(['/', '\\']).next()?;
    let (base, extension) = name.rsplit_once('.')?;
    if extension.is_empty() || base.len() <= DATE_SUFFIX_LEN {
        return None;
    }

    let split = base.len() - DATE_SUFFIX_LEN;
    if !base.is_char_boundary(split) {
        return None;
    }
    let (ticker, suffix) = base.split_at(split);
    let date_str = suffix.strip_prefix('_')?;
    let date = NaiveDate::parse_from_str(date_str, DATE_FORMAT).ok()?;

    Some(HoldingsFile {
        ticker: ticker.to_string(),
        date,
        extension: extension.to_string(),
    })
}
