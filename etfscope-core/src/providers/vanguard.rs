use super::{HttpClient, ProviderClient, ProviderSettings, RawResponse};
use crate::domain::{Provider, SecurityListing};
use crate::error::FetchError;
use crate::parse::{self, ParsedHoldings};
use crate::planner::previous_month_end;
use chrono::{NaiveDate, Utc};
use tracing::info;

/// Vanguard only publishes month-end snapshots; a latest query asks for the
/// most recent month-end before today.
pub struct VanguardClient {
    http: HttpClient,
    listings_url: String,
    holdings_url: String,
    product_url: String,
}

impl VanguardClient {
    pub fn new(http: HttpClient, settings: &ProviderSettings) -> Self {
        Self {
            http,
            listings_url: settings.vanguard_listings_url.clone(),
            holdings_url: settings.vanguard_holdings_url.clone(),
            product_url: settings.vanguard_product_url.clone(),
        }
    }
}

impl ProviderClient for VanguardClient {
    fn provider(&self) -> Provider {
        Provider::Vanguard
    }

    fn fetch_listings(&self) -> Result<Vec<SecurityListing>, FetchError> {
        let body = self.http.get_text(&self.listings_url, &[])?;
        Ok(parse::listings::vanguard_listings(&body, &self.product_url)?)
    }

    fn fetch_raw(
        &self,
        listing: &SecurityListing,
        date: Option<NaiveDate>,
    ) -> Result<RawResponse, FetchError> {
        let product_id = listing
            .product_id
            .as_deref()
            .ok_or_else(|| FetchError::UnsupportedQuery {
                provider: Provider::Vanguard,
                reason: format!("listing for {} has no product id", listing.ticker),
            })?;
        let date = date.unwrap_or_else(|| previous_month_end(Utc::now().date_naive()));

        let url = self.holdings_url.replace("{product_id}", product_id);
        info!(
            provider = %Provider::Vanguard,
            ticker = %listing.ticker,
            product_id,
            %date,
            "querying holdings"
        );
        let body = self
            .http
            .get(&url, &[("as-of-date", date.format("%Y-%m-%d").to_string())])?;
        Ok(RawResponse {
            url,
            requested_date: Some(date),
            body,
        })
    }

    fn parse_holdings(
        &self,
        listing: &SecurityListing,
        raw: &RawResponse,
    ) -> Result<ParsedHoldings, FetchError> {
        let product_id = listing.product_key();
        let requested = raw.requested_date.ok_or_else(|| FetchError::UnsupportedQuery {
            provider: Provider::Vanguard,
            reason: "a holdings date is required".into(),
        })?;
        Ok(parse::vanguard::parse_holdings(
            &listing.ticker,
            product_id,
            requested,
            raw.text()?,
        )?)
    }
}
