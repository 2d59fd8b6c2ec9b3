use super::{HttpClient, ProviderClient, ProviderSettings, RawResponse};
use crate::domain::{Provider, SecurityListing};
use crate::error::FetchError;
use crate::parse::{self, check_mismatch, listings::join_url, ParsedHoldings};
use chrono::NaiveDate;
use tracing::info;

/// Download endpoint appended to each fund's product page.
const AJAX_ENDPOINT: &str = "1467271812596.ajax";

pub struct ISharesClient {
    http: HttpClient,
    host: String,
    listings_path: String,
}

impl ISharesClient {
    pub fn new(http: HttpClient, settings: &ProviderSettings) -> Self {
        Self {
            http,
            host: settings.ishares_host.clone(),
            listings_path: settings.ishares_listings_path.clone(),
        }
    }
}

impl ProviderClient for ISharesClient {
    fn provider(&self) -> Provider {
        Provider::IShares
    }

    fn fetch_listings(&self) -> Result<Vec<SecurityListing>, FetchError> {
        let body = self
            .http
            .get_text(&join_url(&self.host, &self.listings_path), &[])?;
        Ok(parse::listings::ishares_listings(&body, &self.host)?)
    }

    fn fetch_raw(
        &self,
        listing: &SecurityListing,
        date: Option<NaiveDate>,
    ) -> Result<RawResponse, FetchError> {
        let product_url = listing
            .product_url
            .as_deref()
            .ok_or_else(|| FetchError::UnsupportedQuery {
                provider: Provider::IShares,
                reason: format!("listing for {} has no product url", listing.ticker),
            })?;
        let url = join_url(product_url, AJAX_ENDPOINT);

        let mut query = vec![
            ("fileType", "csv".to_string()),
            ("fileName", format!("{}_holdings", listing.ticker)),
            ("dataType", "fund".to_string()),
        ];
        if let Some(d) = date {
            query.push(("asOfDate", d.format("%Y%m%d").to_string()));
        }

        info!(
            provider = %Provider::IShares,
            ticker = %listing.ticker,
            date = ?date,
            "querying holdings"
        );
        let body = self.http.get(&url, &query)?;
        Ok(RawResponse {
            url,
            requested_date: date,
            body,
        })
    }

    fn parse_holdings(
        &self,
        listing: &SecurityListing,
        raw: &RawResponse,
    ) -> Result<ParsedHoldings, FetchError> {
        let parsed = parse::ishares::parse_holdings(
            &listing.ticker,
            raw.text()?,
            listing.asset_class.as_deref(),
        )?;
        if let Some(requested) = raw.requested_date {
            check_mismatch("holdings date", &requested, &parsed.table.as_of_date)?;
        }
        Ok(parsed)
    }
}
