//! Provider fetch clients.
//!
//! Every provider implements [`ProviderClient`]; the [`ProviderRegistry`] maps
//! a listing's provider tag to its client so callers never branch on provider.

pub mod http;
pub mod invesco;
pub mod ishares;
pub mod ssga;
pub mod vanguard;

pub use http::{HttpClient, RawResponse};
pub use invesco::InvescoClient;
pub use ishares::ISharesClient;
pub use ssga::SsgaClient;
pub use vanguard::VanguardClient;

use crate::domain::{Provider, SecurityListing};
use crate::error::FetchError;
use crate::parse::ParsedHoldings;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Listing and holdings retrieval for one provider.
pub trait ProviderClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Download and parse the provider's fund directory.
    fn fetch_listings(&self) -> Result<Vec<SecurityListing>, FetchError>;

    /// Validate the request and download the raw holdings response.
    ///
    /// Requests the provider cannot serve (historical dates where only the
    /// latest snapshot exists, unsupported fund types) fail here before any I/O.
    fn fetch_raw(
        &self,
        listing: &SecurityListing,
        date: Option<NaiveDate>,
    ) -> Result<RawResponse, FetchError>;

    /// Parse a response from [`fetch_raw`](Self::fetch_raw) and cross-check it
    /// against the request.
    fn parse_holdings(
        &self,
        listing: &SecurityListing,
        raw: &RawResponse,
    ) -> Result<ParsedHoldings, FetchError>;

    fn fetch_holdings(
        &self,
        listing: &SecurityListing,
        date: Option<NaiveDate>,
    ) -> Result<ParsedHoldings, FetchError> {
        check_provider(self.provider(), listing)?;
        let raw = self.fetch_raw(listing, date)?;
        self.parse_holdings(listing, &raw)
    }
}

pub(crate) fn check_provider(client: Provider, listing: &SecurityListing) -> Result<(), FetchError> {
    if listing.provider == client {
        Ok(())
    } else {
        Err(FetchError::WrongProvider {
            ticker: listing.ticker.clone(),
            listed: listing.provider,
            client,
        })
    }
}

pub(crate) fn latest_only(provider: Provider, date: Option<NaiveDate>) -> Result<(), FetchError> {
    match date {
        None => Ok(()),
        Some(d) => Err(FetchError::UnsupportedQuery {
            provider,
            reason: format!("only the latest holdings are available, not {d}"),
        }),
    }
}

// ── Settings ──

/// Endpoint and transport settings; every field has a working default.
///
/// Deserialised from the `[providers]` table of the scrape config. Tests point
/// the URLs at a local mock server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub user_agent: String,
    pub timeout_secs: u64,

    pub ishares_host: String,
    pub ishares_listings_path: String,

    pub ssga_host: String,
    pub ssga_fund_finder_url: String,
    pub ssga_product_data_url: String,
    /// `{ticker}` is replaced by the lower-case ticker.
    pub ssga_holdings_url: String,

    pub vanguard_listings_url: String,
    /// `{product_id}` is replaced by the Vanguard fund id.
    pub vanguard_holdings_url: String,
    pub vanguard_product_url: String,

    pub invesco_listings_url: String,
    /// `{ticker}` is replaced by the upper-case ticker.
    pub invesco_holdings_url: String,
    pub invesco_product_url: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            user_agent: http::DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            ishares_host: "https://www.ishares.com".into(),
            ishares_listings_path: "/us/product-screener/product-screener-v3.1.jsn?dcrPath=/templatedata/config/product-screener-v3/data/en/us-ishares/ishares-product-screener-backend-config&siteEntryPassthrough=true".into(),
            ssga_host: "https://www.ssga.com".into(),
            ssga_fund_finder_url: "https://www.ssga.com/bin/v1/ssmp/fund/fundfinder?country=us&language=en&role=intermediary&product=@all&ui=fund-finder".into(),
            ssga_product_data_url: "https://www.ssga.com/us/en/intermediary/ic/library-content/products/fund-data/etfs/us/spdr-product-data-us-en.xlsx".into(),
            ssga_holdings_url: "https://www.ssga.com/us/en/intermediary/etfs/library-content/products/fund-data/etfs/us/holdings-daily-us-en-{ticker}.xlsx".into(),
            vanguard_listings_url: "https://investor.vanguard.com/investment-products/list/funddetail".into(),
            vanguard_holdings_url: "https://eds.ecs.gisp.c1.vanguard.com/eds-eip-distributions-service/holdings/holding-details-history/{product_id}.json".into(),
            vanguard_product_url: "https://advisors.vanguard.com/investments/products/".into(),
            invesco_listings_url: "https://www.invesco.com/us/financial-products/etfs/performance/prices/main/performance/0?audienceType=Advisor&action=download".into(),
            invesco_holdings_url: "https://www.invesco.com/us/financial-products/etfs/holdings/main/holdings/0?audienceType=Investor&action=download&ticker={ticker}".into(),
            invesco_product_url: "https://www.invesco.com/us/financial-products/etfs/product-detail?audienceType=Investor&ticker={ticker}".into(),
        }
    }
}

impl ProviderSettings {
    pub fn http_client(&self) -> Result<HttpClient, FetchError> {
        HttpClient::new(&self.user_agent, Duration::from_secs(self.timeout_secs))
    }
}

// ── Registry ──

/// Lookup table from provider tag to client.
#[derive(Default)]
pub struct ProviderRegistry {
    clients: HashMap<Provider, Box<dyn ProviderClient>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All four built-in clients sharing one HTTP client.
    pub fn with_settings(settings: &ProviderSettings) -> Result<Self, FetchError> {
        let http = settings.http_client()?;
        let mut registry = Self::new();
        registry.register(Box::new(ISharesClient::new(http.clone(), settings)));
        registry.register(Box::new(SsgaClient::new(http.clone(), settings)));
        registry.register(Box::new(VanguardClient::new(http.clone(), settings)));
        registry.register(Box::new(InvescoClient::new(http, settings)));
        Ok(registry)
    }

    /// Add or replace the client for its provider.
    pub fn register(&mut self, client: Box<dyn ProviderClient>) {
        self.clients.insert(client.provider(), client);
    }

    pub fn get(&self, provider: Provider) -> Result<&dyn ProviderClient, FetchError> {
        self.clients
            .get(&provider)
            .map(|c| c.as_ref())
            .ok_or(FetchError::UnknownProvider(provider))
    }

    pub fn providers(&self) -> Vec<Provider> {
        let mut ps: Vec<Provider> = self.clients.keys().copied().collect();
        ps.sort();
        ps
    }
}
