//! Column-mapping contract between provider responses and [`FundHolding`].
//!
//! Each provider's holdings layout is a static [`ColumnMap`]: source column
//! title → canonical [`Field`], plus the minimum set of source columns that must
//! be present. Parsers validate `required` against the response header before
//! remapping anything, so a layout change fails with the exact missing titles.

use crate::domain::FundHolding;
use crate::parse::ParseError;
use chrono::NaiveDate;

/// Canonical holding columns a provider column can map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    AsOfDate,
    Ticker,
    Isin,
    Sedol,
    Cusip,
    Name,
    Amount,
    Weight,
    SecurityType,
    Sector,
    AssetClass,
    MarketValue,
    NotionalValue,
    Price,
    Location,
    Exchange,
    Currency,
    FxRate,
    MarketCurrency,
    Duration,
    ModifiedDuration,
    Coupon,
    Maturity,
    Ytm,
    YieldToWorst,
    YieldToCall,
    RealDuration,
    RealYtm,
    AccrualDate,
    EffectiveDate,
}

/// How a field's raw text is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Date,
}

impl Field {
    pub fn kind(&self) -> FieldKind {
        use Field::*;
        match self {
            Amount | Weight | MarketValue | NotionalValue | Price | FxRate | Duration
            | ModifiedDuration | Coupon | Ytm | YieldToWorst | YieldToCall | RealDuration
            | RealYtm => FieldKind::Number,
            AsOfDate | Maturity | AccrualDate | EffectiveDate => FieldKind::Date,
            _ => FieldKind::Text,
        }
    }

    /// Canonical (output) column name.
    pub fn name(&self) -> &'static str {
        use Field::*;
        match self {
            AsOfDate => "as_of_date",
            Ticker => "ticker",
            Isin => "isin",
            Sedol => "sedol",
            Cusip => "cusip",
            Name => "name",
            Amount => "amount",
            Weight => "weight",
            SecurityType => "security_type",
            Sector => "sector",
            AssetClass => "asset_class",
            MarketValue => "market_value",
            NotionalValue => "notional_value",
            Price => "price",
            Location => "location",
            Exchange => "exchange",
            Currency => "currency",
            FxRate => "fx_rate",
            MarketCurrency => "market_currency",
            Duration => "duration",
            ModifiedDuration => "modified_duration",
            Coupon => "coupon",
            Maturity => "maturity",
            Ytm => "ytm",
            YieldToWorst => "yield_to_worst",
            YieldToCall => "yield_to_call",
            RealDuration => "real_duration",
            RealYtm => "real_ytm",
            AccrualDate => "accrual_date",
            EffectiveDate => "effective_date",
        }
    }

    /// Coerce `raw` according to this field's kind and store it on `holding`.
    ///
    /// `column` is the source title, used only for error messages.
    pub fn assign(
        &self,
        holding: &mut FundHolding,
        column: &str,
        raw: Option<&str>,
        date_format: &str,
    ) -> Result<(), ParseError> {
        use Field::*;
        match self.kind() {
            FieldKind::Text => {
                let v = clean_text(raw).map(str::to_string);
                match self {
                    Ticker => holding.ticker = v,
                    Isin => holding.isin = v,
                    Sedol => holding.sedol = v,
                    Cusip => holding.cusip = v,
                    Name => holding.name = v,
                    SecurityType => holding.security_type = v,
                    Sector => holding.sector = v,
                    AssetClass => holding.asset_class = v,
                    Location => holding.location = v,
                    Exchange => holding.exchange = v,
                    Currency => holding.currency = v,
                    MarketCurrency => holding.market_currency = v,
                    _ => unreachable!("{self:?} is not a text field"),
                }
            }
            FieldKind::Number => {
                let v = parse_number(column, raw)?;
                match self {
                    Amount => holding.amount = v,
                    Weight => holding.weight = v,
                    MarketValue => holding.market_value = v,
                    NotionalValue => holding.notional_value = v,
                    Price => holding.price = v,
                    FxRate => holding.fx_rate = v,
                    Duration => holding.duration = v,
                    ModifiedDuration => holding.modified_duration = v,
                    Coupon => holding.coupon = v,
                    Ytm => holding.ytm = v,
                    YieldToWorst => holding.yield_to_worst = v,
                    YieldToCall => holding.yield_to_call = v,
                    RealDuration => holding.real_duration = v,
                    RealYtm => holding.real_ytm = v,
                    _ => unreachable!("{self:?} is not a numeric field"),
                }
            }
            FieldKind::Date => {
                let v = match clean(raw) {
                    Some(s) => Some(parse_date(s, date_format)?),
                    None => None,
                };
                match self {
                    AsOfDate => {
                        if let Some(v) = v {
                            holding.as_of_date = v;
                        }
                    }
                    Maturity => holding.maturity = v,
                    AccrualDate => holding.accrual_date = v,
                    EffectiveDate => holding.effective_date = v,
                    _ => unreachable!("{self:?} is not a date field"),
                }
            }
        }
        Ok(())
    }
}

// ── Value coercion ──

/// Placeholder tokens providers use for "no value" in numeric and date cells.
pub const NA_TOKENS: &[&str] = &["", "-", "--", "N/A", "NA", "n/a", "nan", "NaN"];

/// Placeholders in identifier and label cells. `NA` and `NAN` are real tickers.
pub const TEXT_NA_TOKENS: &[&str] = &["", "-", "--", "N/A", "n/a"];

/// Trim and map numeric placeholder tokens to `None`.
pub fn clean(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !NA_TOKENS.contains(s))
}

/// Trim and map text placeholder tokens to `None`.
pub fn clean_text(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !TEXT_NA_TOKENS.contains(s))
}

/// Parse a numeric cell, tolerating thousands separators and a trailing `%`.
pub fn parse_number(column: &str, raw: Option<&str>) -> Result<Option<f64>, ParseError> {
    let Some(s) = clean(raw) else {
        return Ok(None);
    };
    let normalized: String = s
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    normalized
        .trim()
        .parse::<f64>()
        .map(Some)
        .map_err(|_| ParseError::InvalidNumber {
            column: column.to_string(),
            value: s.to_string(),
        })
}

/// Parse a date with a chrono format string. ISO dates may carry a time suffix.
pub fn parse_date(s: &str, format: &str) -> Result<NaiveDate, ParseError> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, format)
        .or_else(|e| match (format, s.get(..10)) {
            ("%Y-%m-%d", Some(prefix)) if s.len() > 10 => {
                NaiveDate::parse_from_str(prefix, format)
            }
            _ => Err(e),
        })
        .map_err(|_| ParseError::InvalidDate {
            value: s.to_string(),
            format: format.to_string(),
        })
}

// ── Column maps ──

/// Static mapping table for one provider layout.
#[derive(Debug)]
pub struct ColumnMap {
    pub name: &'static str,
    pub columns: &'static [(&'static str, Field)],
    /// Source titles that must be present.
    pub required: &'static [&'static str],
    /// chrono format used for every date-kind column.
    pub date_format: &'static str,
}

impl ColumnMap {
    /// Required titles absent from `header`, in declaration order.
    pub fn missing_required(&self, header: &[String]) -> Vec<&'static str> {
        self.required
            .iter()
            .copied()
            .filter(|c| !header.iter().any(|h| h == c))
            .collect()
    }

    /// Mapped (but optional) titles absent from `header`.
    pub fn missing_optional(&self, header: &[String]) -> Vec<&'static str> {
        self.columns
            .iter()
            .map(|(c, _)| *c)
            .filter(|c| !self.required.contains(c) && !header.iter().any(|h| h == c))
            .collect()
    }

    /// Fail with [`ParseError::MissingColumns`] unless every required title is present.
    pub fn check_required(&self, header: &[String]) -> Result<(), ParseError> {
        let missing = self.missing_required(header);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ParseError::missing_columns(missing))
        }
    }

    pub fn field_for(&self, title: &str) -> Option<Field> {
        self.columns
            .iter()
            .find(|(c, _)| *c == title)
            .map(|(_, f)| *f)
    }
}

/// Pick the single candidate title present in `header`.
///
/// Layouts that rename a column between fund types (e.g. `Date` vs `PositionDate`)
/// must show exactly one of the candidates; zero or several is ambiguous.
pub fn exactly_one_of(
    header: &[String],
    canonical: &'static str,
    candidates: &[&str],
) -> Result<String, ParseError> {
    let found: Vec<&String> = header
        .iter()
        .filter(|h| candidates.contains(&h.as_str()))
        .collect();
    match found.as_slice() {
        [one] => Ok((*one).clone()),
        _ => Err(ParseError::AmbiguousColumns {
            canonical,
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
            found: found.len(),
        }),
    }
}

/// iShares equity, real-estate and commodity funds.
pub const ISHARES_EQUITY: ColumnMap = ColumnMap {
    name: "ishares_equity",
    columns: &[
        ("Ticker", Field::Ticker),
        ("Name", Field::Name),
        ("Sector", Field::Sector),
        ("Asset Class", Field::AssetClass),
        ("Market Value", Field::MarketValue),
        ("Weight (%)", Field::Weight),
        ("Notional Value", Field::NotionalValue),
        ("Shares", Field::Amount),
        ("Price", Field::Price),
        ("Location", Field::Location),
        ("Exchange", Field::Exchange),
        ("Currency", Field::Currency),
        ("FX Rate", Field::FxRate),
        ("Market Currency", Field::MarketCurrency),
    ],
    required: &["Ticker", "Shares", "Market Value", "Weight (%)"],
    date_format: "%b %d, %Y",
};

/// iShares fixed-income funds: par instead of shares plus bond analytics.
pub const ISHARES_FIXED_INCOME: ColumnMap = ColumnMap {
    name: "ishares_fixed_income",
    columns: &[
        ("Ticker", Field::Ticker),
        ("Name", Field::Name),
        ("Sector", Field::Sector),
        ("Asset Class", Field::AssetClass),
        ("Market Value", Field::MarketValue),
        ("Weight (%)", Field::Weight),
        ("Notional Value", Field::NotionalValue),
        ("Par Value", Field::Amount),
        ("CUSIP", Field::Cusip),
        ("ISIN", Field::Isin),
        ("SEDOL", Field::Sedol),
        ("Price", Field::Price),
        ("Location", Field::Location),
        ("Exchange", Field::Exchange),
        ("Currency", Field::Currency),
        ("Duration", Field::Duration),
        ("YTM (%)", Field::Ytm),
        ("FX Rate", Field::FxRate),
        ("Maturity", Field::Maturity),
        ("Coupon (%)", Field::Coupon),
        ("Mod. Duration", Field::ModifiedDuration),
        ("Yield to Call (%)", Field::YieldToCall),
        ("Yield to Worst (%)", Field::YieldToWorst),
        ("Real Duration", Field::RealDuration),
        ("Real YTM (%)", Field::RealYtm),
        ("Market Currency", Field::MarketCurrency),
        ("Accrual Date", Field::AccrualDate),
        ("Effective Date", Field::EffectiveDate),
    ],
    required: &["Name", "Par Value", "Market Value", "Weight (%)"],
    date_format: "%b %d, %Y",
};

pub const SSGA_HOLDINGS: ColumnMap = ColumnMap {
    name: "ssga",
    columns: &[
        ("Name", Field::Name),
        ("Ticker", Field::Ticker),
        ("Identifier", Field::Cusip),
        ("SEDOL", Field::Sedol),
        ("Weight", Field::Weight),
        ("Sector", Field::Sector),
        ("Shares Held", Field::Amount),
        ("Local Currency", Field::Currency),
    ],
    required: &["Ticker", "Shares Held"],
    date_format: "%d-%b-%Y",
};

pub const VANGUARD_HOLDINGS: ColumnMap = ColumnMap {
    name: "vanguard",
    columns: &[
        ("effectiveDate", Field::AsOfDate),
        ("bticker", Field::Ticker),
        ("sedol", Field::Sedol),
        ("CUSIP", Field::Cusip),
        ("name", Field::Name),
        ("quantity", Field::Amount),
        ("mktValPercent", Field::Weight),
        ("parentIssueTypeName", Field::SecurityType),
        ("sector", Field::Sector),
        ("market", Field::Exchange),
        ("marketVal", Field::MarketValue),
        ("countryOfRiskCode", Field::Location),
    ],
    required: &["effectiveDate", "bticker", "quantity"],
    date_format: "%Y-%m-%d",
};

/// Invesco; the date and identifier titles vary by fund type and are resolved
/// with [`exactly_one_of`] against [`INVESCO_DATE_COLUMNS`] / [`INVESCO_ID_COLUMNS`].
pub const INVESCO_HOLDINGS: ColumnMap = ColumnMap {
    name: "invesco",
    columns: &[
        ("Holding Ticker", Field::Ticker),
        ("Shares/Par Value", Field::Amount),
        ("MarketValue", Field::MarketValue),
        ("Weight", Field::Weight),
        ("Name", Field::Name),
        ("Class of Shares", Field::SecurityType),
        ("Sector", Field::Sector),
    ],
    required: &["Holding Ticker", "Shares/Par Value"],
    date_format: "%m/%d/%Y",
};

/// Reported fund ticker; cross-checked against the query rather than mapped.
pub const INVESCO_FUND_TICKER_COLUMN: &str = "Fund Ticker";
pub const INVESCO_DATE_COLUMNS: &[&str] = &["Date", "PositionDate"];
pub const INVESCO_ID_COLUMNS: &[&str] = &["Security Identifier", "CUSIP"];
