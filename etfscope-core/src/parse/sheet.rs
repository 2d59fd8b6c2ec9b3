//! Spreadsheet decoding into a plain cell grid.
//!
//! The SSGA parsers work on `Vec<Vec<SheetCell>>` so they can be exercised
//! without binary fixtures; only [`read_first_sheet`] touches the xlsx format.

use super::ParseError;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub enum SheetCell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl SheetCell {
    pub fn text(s: &str) -> Self {
        SheetCell::Text(s.to_string())
    }

    /// String form used when feeding the shared column mapping.
    pub fn as_string(&self) -> Option<String> {
        match self {
            SheetCell::Empty => None,
            SheetCell::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            SheetCell::Number(n) => Some(n.to_string()),
            SheetCell::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_string().is_none()
    }
}

/// Excel serial day 0 (accounting for the 1900 leap-year bug).
#[cfg_attr(not(feature = "xlsx"), allow(dead_code))]
fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(chrono::Duration::days(serial.floor() as i64))
}

/// Decode the first worksheet of an xlsx/xls document.
#[cfg(feature = "xlsx")]
pub fn read_first_sheet(bytes: &[u8]) -> Result<Vec<Vec<SheetCell>>, ParseError> {
    use calamine::{open_workbook_auto_from_rs, Data, Reader};
    use std::io::Cursor;

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ParseError::Sheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ParseError::Sheet("workbook has no worksheets".into()))?
        .map_err(|e| ParseError::Sheet(e.to_string()))?;

    let grid = range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::Empty | Data::Error(_) => SheetCell::Empty,
                    Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
                        SheetCell::Text(s.clone())
                    }
                    Data::Float(f) => SheetCell::Number(*f),
                    Data::Int(i) => SheetCell::Number(*i as f64),
                    Data::Bool(b) => SheetCell::Text(b.to_string()),
                    Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
                        .map_or(SheetCell::Number(dt.as_f64()), SheetCell::Date),
                })
                .collect()
        })
        .collect();
    Ok(grid)
}

#[cfg(not(feature = "xlsx"))]
pub fn read_first_sheet(_bytes: &[u8]) -> Result<Vec<Vec<SheetCell>>, ParseError> {
    Err(ParseError::MissingDependency { feature: "xlsx" })
}
