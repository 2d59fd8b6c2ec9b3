//! Ticker-level entry point: listing lookup, provider dispatch, fetch and parse.

use crate::domain::{HoldingsTable, Provider, SecurityListing};
use crate::error::FetchError;
use crate::listings::ListingDirectory;
use crate::providers::ProviderRegistry;
use chrono::NaiveDate;
use tracing::{debug, info};

/// Anything that can turn a `(ticker, date)` query into a holdings table.
///
/// The orchestrator depends on this trait rather than on [`EtfScraper`] so
/// batches can run against canned sources in tests.
pub trait HoldingsSource: Send + Sync {
    /// `date == None` asks for the latest snapshot; the returned table carries
    /// the as-of date the provider resolved.
    fn query_holdings(
        &self,
        ticker: &str,
        date: Option<NaiveDate>,
    ) -> Result<HoldingsTable, FetchError>;
}

/// A listing snapshot plus the provider clients that serve it.
pub struct EtfScraper {
    directory: ListingDirectory,
    registry: ProviderRegistry,
}

impl EtfScraper {
    pub fn new(directory: ListingDirectory, registry: ProviderRegistry) -> Self {
        Self {
            directory,
            registry,
        }
    }

    pub fn directory(&self) -> &ListingDirectory {
        &self.directory
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn listing(&self, ticker: &str) -> Result<&SecurityListing, FetchError> {
        self.directory.lookup(ticker)
    }

    /// Fetch one provider's listings.
    pub fn fetch_listings(&self, provider: Provider) -> Result<Vec<SecurityListing>, FetchError> {
        let listings = self.registry.get(provider)?.fetch_listings()?;
        info!(%provider, listings = listings.len(), "fetched listings");
        Ok(listings)
    }
}

impl HoldingsSource for EtfScraper {
    fn query_holdings(
        &self,
        ticker: &str,
        date: Option<NaiveDate>,
    ) -> Result<HoldingsTable, FetchError> {
        let listing = self.directory.lookup(ticker)?;
        let client = self.registry.get(listing.provider)?;
        debug!(ticker, provider = %listing.provider, ?date, "dispatching holdings query");

        let parsed = client.fetch_holdings(listing, date)?;
        info!(
            ticker,
            as_of = %parsed.table.as_of_date,
            rows = parsed.table.len(),
            "parsed holdings"
        );
        Ok(parsed.table)
    }
}
