use super::{latest_only, HttpClient, ProviderClient, ProviderSettings, RawResponse};
use crate::domain::{Provider, SecurityListing};
use crate::error::FetchError;
use crate::parse::{self, ParsedHoldings};
use chrono::NaiveDate;
use tracing::info;

/// ETF holdings only; Invesco mutual funds are not listed.
pub struct InvescoClient {
    http: HttpClient,
    listings_url: String,
    holdings_url: String,
    product_url: String,
}

impl InvescoClient {
    pub fn new(http: HttpClient, settings: &ProviderSettings) -> Self {
        Self {
            http,
            listings_url: settings.invesco_listings_url.clone(),
            holdings_url: settings.invesco_holdings_url.clone(),
            product_url: settings.invesco_product_url.clone(),
        }
    }
}

impl ProviderClient for InvescoClient {
    fn provider(&self) -> Provider {
        Provider::Invesco
    }

    fn fetch_listings(&self) -> Result<Vec<SecurityListing>, FetchError> {
        let body = self.http.get_text(&self.listings_url, &[])?;
        Ok(parse::listings::invesco_listings(&body, &self.product_url)?)
    }

    fn fetch_raw(
        &self,
        listing: &SecurityListing,
        date: Option<NaiveDate>,
    ) -> Result<RawResponse, FetchError> {
        latest_only(Provider::Invesco, date)?;
        let url = self
            .holdings_url
            .replace("{ticker}", &listing.ticker.to_uppercase());
        info!(provider = %Provider::Invesco, ticker = %listing.ticker, "querying latest holdings");
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
        Ok(parse::invesco::parse_holdings(&listing.ticker, raw.text()?)?)
    }
}
