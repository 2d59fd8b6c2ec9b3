//! Listing Directory: an immutable snapshot of known funds.
//!
//! Built from provider listing endpoints or from a saved CSV snapshot, then
//! shared read-only across workers. Refreshing means building a new directory.

use crate::domain::{Provider, SecurityListing};
use crate::error::FetchError;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ListingsError {
    #[error("listings file I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("listings csv: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, Default)]
pub struct ListingDirectory {
    listings: Vec<SecurityListing>,
    by_ticker: HashMap<String, Vec<usize>>,
}

impl ListingDirectory {
    /// Build a directory, dropping exact duplicate rows.
    pub fn new(listings: Vec<SecurityListing>) -> Self {
        let mut unique: Vec<SecurityListing> = Vec::with_capacity(listings.len());
        let mut by_ticker: HashMap<String, Vec<usize>> = HashMap::new();
        for l in listings {
            // duplicates can only share a ticker, so compare within its bucket
            let slots = by_ticker.entry(l.ticker.clone()).or_default();
            if slots.iter().any(|&i| unique[i] == l) {
                continue;
            }
            slots.push(unique.len());
            unique.push(l);
        }
        Self {
            listings: unique,
            by_ticker,
        }
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, ListingsError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let listings = rdr
            .deserialize::<SecurityListing>()
            .collect::<Result<Vec<_>, _>>()?;
        let n = listings.len();
        let dir = Self::new(listings);
        if dir.len() < n {
            debug!(dropped = n - dir.len(), "dropped duplicate listing rows");
        }
        Ok(dir)
    }

    /// Load a CSV snapshot written by [`save_csv`](Self::save_csv).
    pub fn load_csv(path: &Path) -> Result<Self, ListingsError> {
        let file = std::fs::File::open(path)?;
        let dir = Self::from_csv_reader(file)?;
        info!(path = %path.display(), listings = dir.len(), "loaded listings snapshot");
        Ok(dir)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ListingsError> {
        let mut wtr = csv::Writer::from_writer(writer);
        for l in &self.listings {
            wtr.serialize(l)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn save_csv(&self, path: &Path) -> Result<(), ListingsError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        self.write_csv(std::fs::File::create(path)?)?;
        info!(path = %path.display(), listings = self.len(), "saved listings snapshot");
        Ok(())
    }

    /// The single listing for `ticker`.
    ///
    /// Zero matches is [`FetchError::UnknownTicker`]; several is
    /// [`FetchError::AmbiguousTicker`]. Both are per-item failures.
    pub fn lookup(&self, ticker: &str) -> Result<&SecurityListing, FetchError> {
        match self.by_ticker.get(ticker).map(Vec::as_slice) {
            None | Some([]) => Err(FetchError::UnknownTicker {
                ticker: ticker.to_string(),
            }),
            Some([i]) => Ok(&self.listings[*i]),
            Some(many) => Err(FetchError::AmbiguousTicker {
                ticker: ticker.to_string(),
                count: many.len(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SecurityListing> {
        self.listings.iter()
    }

    pub fn by_provider(&self, provider: Provider) -> impl Iterator<Item = &SecurityListing> {
        self.listings.iter().filter(move |l| l.provider == provider)
    }

    /// Tickers in snapshot order, each once.
    pub fn tickers(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.listings
            .iter()
            .map(|l| l.ticker.as_str())
            .filter(|t| seen.insert(*t))
            .collect()
    }
}

impl FromIterator<SecurityListing> for ListingDirectory {
    fn from_iter<I: IntoIterator<Item = SecurityListing>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
