//! etfscope core: holdings schema, provider parsers and clients, listings,
//! trading calendar, date planning and fetch reconciliation.
//!
//! This crate is synchronous and owns no thread pools:
//! - Domain types (listings, holdings, query keys)
//! - Static column layouts and the four provider response parsers
//! - Provider fetch clients behind one registry
//! - Listing directory snapshots
//! - Date-range planner over a pluggable trading calendar
//! - Filename codec and reconciler that decide what still needs fetching

pub mod calendar;
pub mod domain;
pub mod error;
pub mod listings;
pub mod naming;
pub mod parse;
pub mod planner;
pub mod providers;
pub mod reconcile;
pub mod schema;
pub mod scraper;

pub use error::{Classify, ErrorClass, FetchError};
pub use scraper::{EtfScraper, HoldingsSource};
