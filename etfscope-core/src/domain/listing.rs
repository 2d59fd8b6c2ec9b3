use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The fund families whose holdings endpoints are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provider {
    IShares,
    SSGA,
    Vanguard,
    Invesco,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::IShares,
        Provider::SSGA,
        Provider::Vanguard,
        Provider::Invesco,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::IShares => "IShares",
            Provider::SSGA => "SSGA",
            Provider::Vanguard => "Vanguard",
            Provider::Invesco => "Invesco",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown provider '{0}' (expected one of IShares, SSGA, Vanguard, Invesco)")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    /// Case-insensitive so CLI flags and snapshot files can use `ishares` or `IShares`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

/// Exchange-traded fund or mutual fund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FundType {
    ETF,
    MF,
}

impl fmt::Display for FundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FundType::ETF => f.write_str("ETF"),
            FundType::MF => f.write_str("MF"),
        }
    }
}

/// One tradable fund as described by a provider's listing endpoint.
///
/// Providers do not publish a uniform superset of fields, so everything past
/// `ticker` and `provider` is optional. Field order is the snapshot CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityListing {
    pub ticker: String,
    pub provider: Provider,
    pub fund_name: Option<String>,
    pub asset_class: Option<String>,
    pub subasset_class: Option<String>,
    pub fund_type: Option<FundType>,
    pub cusip: Option<String>,
    pub isin: Option<String>,
    pub product_id: Option<String>,
    pub product_url: Option<String>,
    pub inception_date: Option<NaiveDate>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub net_assets: Option<f64>,
    pub benchmark: Option<String>,
    pub exchange: Option<String>,
}

impl SecurityListing {
    /// A listing with only the key fields populated.
    pub fn new(ticker: impl Into<String>, provider: Provider) -> Self {
        Self {
            ticker: ticker.into(),
            provider,
            fund_name: None,
            asset_class: None,
            subasset_class: None,
            fund_type: None,
            cusip: None,
            isin: None,
            product_id: None,
            product_url: None,
            inception_date: None,
            country: None,
            region: None,
            net_assets: None,
            benchmark: None,
            exchange: None,
        }
    }

    /// Builder-style setters used by listing parsers and tests.
    pub fn with_fund_type(mut self, fund_type: FundType) -> Self {
        self.fund_type = Some(fund_type);
        self
    }

    pub fn with_asset_class(mut self, asset_class: impl Into<String>) -> Self {
        self.asset_class = Some(asset_class.into());
        self
    }

    pub fn with_product_id(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    pub fn with_product_url(mut self, product_url: impl Into<String>) -> Self {
        self.product_url = Some(product_url.into());
        self
    }

    /// The provider-internal key, falling back to the ticker.
    pub fn product_key(&self) -> &str {
        self.product_id.as_deref().unwrap_or(&self.ticker)
    }
}
