//! Canonical record shapes every provider response is mapped onto.

pub mod holding;
pub mod listing;
pub mod query;

pub use holding::{FundHolding, HoldingsTable, HOLDING_COLUMNS, WEIGHT_SUM_TOLERANCE};
pub use listing::{FundType, Provider, SecurityListing, UnknownProvider};
pub use query::QueryKey;
