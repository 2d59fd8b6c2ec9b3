use crate::error::{Classify, ErrorClass};
use thiserror::Error;

/// Failures raised while turning a provider response body into a holdings table.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("expected exactly one 'as of' date marker in the preamble, found {found}")]
    MissingDateMarker { found: usize },

    #[error("provider returned no holdings: {0}")]
    NoDataReturned(String),

    #[error("response is missing required columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("expected exactly one of [{}] for '{canonical}', found {found}", .candidates.join(", "))]
    AmbiguousColumns {
        canonical: &'static str,
        candidates: Vec<String>,
        found: usize,
    },

    #[error("requested ticker {requested} but the response is for {returned}")]
    TickerMismatch { requested: String, returned: String },

    #[error("{field} mismatch: requested {requested}, provider returned {returned}")]
    DataMismatch {
        field: &'static str,
        requested: String,
        returned: String,
    },

    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    #[error("preamble is missing '{0}'")]
    MissingPreambleField(String),

    #[error("column '{column}': cannot parse '{value}' as a number")]
    InvalidNumber { column: String, value: String },

    #[error("cannot parse '{value}' as a date (expected {format})")]
    InvalidDate { value: String, format: String },

    #[error("expected a single {field}, found {}", .values.join(", "))]
    MultipleValues {
        field: &'static str,
        values: Vec<String>,
    },

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("spreadsheet: {0}")]
    Sheet(String),

    #[error("optional feature '{feature}' is not compiled in")]
    MissingDependency { feature: &'static str },
}

impl ParseError {
    pub fn missing_columns<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ParseError::MissingColumns {
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }
}

impl Classify for ParseError {
    fn error_class(&self) -> ErrorClass {
        match self {
            ParseError::MissingColumns { .. } => ErrorClass::InvalidParameter,
            ParseError::TickerMismatch { .. }
            | ParseError::DataMismatch { .. }
            | ParseError::MultipleValues { .. } => ErrorClass::DataIntegrity,
            ParseError::NoDataReturned(_) => ErrorClass::NoData,
            ParseError::MissingDependency { .. } => ErrorClass::MissingDependency,
            ParseError::MissingDateMarker { .. }
            | ParseError::AmbiguousColumns { .. }
            | ParseError::UnexpectedShape(_)
            | ParseError::MissingPreambleField(_)
            | ParseError::InvalidNumber { .. }
            | ParseError::InvalidDate { .. }
            | ParseError::Csv(_)
            | ParseError::Json(_)
            | ParseError::Sheet(_) => ErrorClass::Parse,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ParseError::MissingDateMarker { .. } => "MissingDateMarker",
            ParseError::NoDataReturned(_) => "NoDataReturned",
            ParseError::MissingColumns { .. } => "MissingColumns",
            ParseError::AmbiguousColumns { .. } => "AmbiguousColumns",
            ParseError::TickerMismatch { .. } => "TickerMismatch",
            ParseError::DataMismatch { .. } => "DataMismatch",
            ParseError::UnexpectedShape(_) => "UnexpectedShape",
            ParseError::MissingPreambleField(_) => "MissingPreambleField",
            ParseError::InvalidNumber { .. } => "InvalidNumber",
            ParseError::InvalidDate { .. } => "InvalidDate",
            ParseError::MultipleValues { .. } => "MultipleValues",
            ParseError::Csv(_) => "Csv",
            ParseError::Json(_) => "Json",
            ParseError::Sheet(_) => "Sheet",
            ParseError::MissingDependency { .. } => "MissingDependency",
        }
    }
}
