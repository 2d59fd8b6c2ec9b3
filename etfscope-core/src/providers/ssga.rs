use super::{latest_only, HttpClient, ProviderClient, ProviderSettings, RawResponse};
use crate::domain::{FundType, Provider, SecurityListing};
use crate::error::FetchError;
use crate::parse::{self, ParsedHoldings};
use chrono::NaiveDate;
use tracing::info;

pub struct SsgaClient {
    http: HttpClient,
    host: String,
    fund_finder_url: String,
    product_data_url: String,
    holdings_url: String,
}

impl SsgaClient {
    pub fn new(http: HttpClient, settings: &ProviderSettings) -> Self {
        Self {
            http,
            host: settings.ssga_host.clone(),
            fund_finder_url: settings.ssga_fund_finder_url.clone(),
            product_data_url: settings.ssga_product_data_url.clone(),
            holdings_url: settings.ssga_holdings_url.clone(),
        }
    }

    fn holdings_url(&self, ticker: &str) -> String {
        self.holdings_url.replace("{ticker}", &ticker.to_lowercase())
    }
}

impl ProviderClient for SsgaClient {
    fn provider(&self) -> Provider {
        Provider::SSGA
    }

    /// Fund-finder listings enriched with the product-data workbook.
    fn fetch_listings(&self) -> Result<Vec<SecurityListing>, FetchError> {
        let finder = self.http.get_text(&self.fund_finder_url, &[])?;
        let listings = parse::listings::ssga_fund_finder(&finder, &self.host)?;

        let workbook = self.http.get(&self.product_data_url, &[])?;
        let grid = parse::sheet::read_first_sheet(&workbook)?;
        let product_data = parse::listings::ssga_product_data(&grid)?;
        Ok(parse::listings::merge_ssga(listings, &product_data))
    }

    fn fetch_raw(
        &self,
        listing: &SecurityListing,
        date: Option<NaiveDate>,
    ) -> Result<RawResponse, FetchError> {
        latest_only(Provider::SSGA, date)?;
        if listing.fund_type != Some(FundType::ETF) {
            return Err(FetchError::UnsupportedFundType {
                provider: Provider::SSGA,
                ticker: listing.ticker.clone(),
                fund_type: listing.fund_type,
            });
        }

        let url = self.holdings_url(&listing.ticker);
        info!(provider = %Provider::SSGA, ticker = %listing.ticker, "querying latest holdings");
        let body = self.http.get(&url, &[])?;
        Ok(RawResponse {
            url,
            requested_date: None,
            body,
        })
    }

    fn parse_holdings(
        &self,
        listing: &SecurityListing,
        raw: &RawResponse,
    ) -> Result<ParsedHoldings, FetchError> {
        Ok(parse::ssga::parse_holdings(&listing.ticker, &raw.body)?)
    }
}
