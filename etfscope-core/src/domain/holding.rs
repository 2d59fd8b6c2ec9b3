use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default tolerance (in weight percentage points) for the sum-to-100 check.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1.0;

/// Output column order; matches the field order of [`FundHolding`].
pub const HOLDING_COLUMNS: [&str; 31] = [
    "fund_ticker",
    "as_of_date",
    "ticker",
    "isin",
    "sedol",
    "cusip",
    "name",
    "amount",
    "weight",
    "security_type",
    "sector",
    "asset_class",
    "market_value",
    "notional_value",
    "price",
    "location",
    "exchange",
    "currency",
    "fx_rate",
    "market_currency",
    "duration",
    "modified_duration",
    "coupon",
    "maturity",
    "ytm",
    "yield_to_worst",
    "yield_to_call",
    "real_duration",
    "real_ytm",
    "accrual_date",
    "effective_date",
];

/// One constituent position of a fund as of a date.
///
/// Fixed-income parses fill the trailing bond fields; equity parses leave them empty.
/// The struct is flat so it serialises directly to a CSV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundHolding {
    pub fund_ticker: String,
    pub as_of_date: NaiveDate,
    pub ticker: Option<String>,
    pub isin: Option<String>,
    pub sedol: Option<String>,
    pub cusip: Option<String>,
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub weight: Option<f64>,
    pub security_type: Option<String>,
    pub sector: Option<String>,
    pub asset_class: Option<String>,
    pub market_value: Option<f64>,
    pub notional_value: Option<f64>,
    pub price: Option<f64>,
    pub location: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    pub fx_rate: Option<f64>,
    pub market_currency: Option<String>,

    // ── Bond fields ──
    pub duration: Option<f64>,
    pub modified_duration: Option<f64>,
    pub coupon: Option<f64>,
    pub maturity: Option<NaiveDate>,
    pub ytm: Option<f64>,
    pub yield_to_worst: Option<f64>,
    pub yield_to_call: Option<f64>,
    pub real_duration: Option<f64>,
    pub real_ytm: Option<f64>,
    pub accrual_date: Option<NaiveDate>,
    pub effective_date: Option<NaiveDate>,
}

impl FundHolding {
    pub fn new(fund_ticker: impl Into<String>, as_of_date: NaiveDate) -> Self {
        Self {
            fund_ticker: fund_ticker.into(),
            as_of_date,
            ticker: None,
            isin: None,
            sedol: None,
            cusip: None,
            name: None,
            amount: None,
            weight: None,
            security_type: None,
            sector: None,
            asset_class: None,
            market_value: None,
            notional_value: None,
            price: None,
            location: None,
            exchange: None,
            currency: None,
            fx_rate: None,
            market_currency: None,
            duration: None,
            modified_duration: None,
            coupon: None,
            maturity: None,
            ytm: None,
            yield_to_worst: None,
            yield_to_call: None,
            real_duration: None,
            real_ytm: None,
            accrual_date: None,
            effective_date: None,
        }
    }
}

/// An ordered set of holdings sharing one `fund_ticker` / `as_of_date` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingsTable {
    pub fund_ticker: String,
    pub as_of_date: NaiveDate,
    pub holdings: Vec<FundHolding>,
}

impl HoldingsTable {
    pub fn new(fund_ticker: impl Into<String>, as_of_date: NaiveDate) -> Self {
        Self {
            fund_ticker: fund_ticker.into(),
            as_of_date,
            holdings: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FundHolding> {
        self.holdings.iter()
    }

    /// Start a new row tagged with this table's fund ticker and date.
    pub fn row(&self) -> FundHolding {
        FundHolding::new(self.fund_ticker.clone(), self.as_of_date)
    }

    pub fn push(&mut self, holding: FundHolding) {
        self.holdings.push(holding);
    }

    /// Sum of `amount`, ignoring rows without one.
    pub fn total_amount(&self) -> f64 {
        self.holdings.iter().filter_map(|h| h.amount).sum()
    }

    /// Sum of `weight`, ignoring rows without one.
    pub fn total_weight(&self) -> f64 {
        self.holdings.iter().filter_map(|h| h.weight).sum()
    }

    /// Whether the weights sum to `expected` within `tolerance` percentage points.
    ///
    /// A miss is a data-quality signal and never rejects the table.
    pub fn weights_balanced(&self, expected: f64, tolerance: f64) -> bool {
        (self.total_weight() - expected).abs() <= tolerance
    }

    pub fn first_ticker(&self) -> Option<&str> {
        self.holdings.first().and_then(|h| h.ticker.as_deref())
    }

    pub fn last_ticker(&self) -> Option<&str> {
        self.holdings.last().and_then(|h| h.ticker.as_deref())
    }
}
