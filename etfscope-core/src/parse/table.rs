//! Untyped intermediate table shared by the CSV, spreadsheet and JSON parsers.

use super::ParseError;
use crate::domain::FundHolding;
use crate::schema::{ColumnMap, Field};
use tracing::warn;

/// Header plus string cells; `None` marks an empty or absent cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// A mapped source column resolved to its position in the header.
#[derive(Debug, Clone)]
pub struct Binding {
    pub index: usize,
    pub title: String,
    pub field: Field,
}

impl RawTable {
    pub fn new(header: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { header, rows }
    }

    /// Read CSV text whose first record is the header. Ragged rows are allowed.
    pub fn from_csv(text: &str) -> Result<Self, ParseError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let header = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|c| (!c.is_empty()).then(|| c.to_string()))
                    .collect(),
            );
        }
        Ok(Self { header, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, title: &str) -> Option<usize> {
        self.header.iter().position(|h| h == title)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|c| c.as_deref())
    }

    /// Index of the first row whose leading cell equals `first_cell`.
    pub fn find_row_starting_with(&self, first_cell: &str) -> Option<usize> {
        self.rows.iter().position(|r| {
            r.first()
                .and_then(|c| c.as_deref())
                .is_some_and(|c| c.trim() == first_cell)
        })
    }

    pub fn truncate(&mut self, len: usize) {
        self.rows.truncate(len);
    }

    /// Keep only rows where numeric column `col` holds a value.
    pub fn retain_present(&mut self, col: usize) {
        self.retain_by(col, crate::schema::clean);
    }

    /// Keep only rows where identifier column `col` holds a value.
    pub fn retain_identified(&mut self, col: usize) {
        self.retain_by(col, crate::schema::clean_text);
    }

    fn retain_by(&mut self, col: usize, clean: fn(Option<&str>) -> Option<&str>) {
        self.rows.retain(|r| {
            r.get(col)
                .and_then(|c| c.as_deref())
                .is_some_and(|c| clean(Some(c)).is_some())
        });
    }

    /// Distinct non-empty values of a column, in first-seen order.
    pub fn distinct(&self, col: usize) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for row in &self.rows {
            if let Some(v) = row.get(col).and_then(|c| c.as_deref()).map(str::trim) {
                if !v.is_empty() && !seen.iter().any(|s| s == v) {
                    seen.push(v.to_string());
                }
            }
        }
        seen
    }

    /// Resolve a column map (plus extra title → field pairs) against the header.
    ///
    /// Required titles must already have been checked; optional ones that are
    /// absent are logged and skipped.
    pub fn bind(&self, map: &ColumnMap, extra: &[(String, Field)]) -> Vec<Binding> {
        let missing = map.missing_optional(&self.header);
        if !missing.is_empty() {
            warn!(layout = map.name, missing = ?missing, "response lacks optional columns");
        }

        map.columns
            .iter()
            .map(|(t, f)| (t.to_string(), *f))
            .chain(extra.iter().cloned())
            .filter_map(|(title, field)| {
                self.column(&title).map(|index| Binding {
                    index,
                    title,
                    field,
                })
            })
            .collect()
    }

    /// Build one holding per row from `template`, applying every binding.
    pub fn to_holdings(
        &self,
        bindings: &[Binding],
        template: &FundHolding,
        date_format: &str,
    ) -> Result<Vec<FundHolding>, ParseError> {
        let mut out = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let mut h = template.clone();
            for b in bindings {
                let raw = row.get(b.index).and_then(|c| c.as_deref());
                b.field.assign(&mut h, &b.title, raw, date_format)?;
            }
            out.push(h);
        }
        Ok(out)
    }
}
