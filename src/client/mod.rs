//! Upstream clients
//!
//! - EDGAR: filing listing, ownership documents, issuer classification
//! - Market data: current price and trailing change per ticker
//!
//! The pipeline talks to both through the traits below so tests can
//! substitute mocks.

mod edgar;
mod market;
pub mod ownership;
pub mod rate_limit;

pub use edgar::EdgarClient;
pub use market::MarketDataClient;
pub use rate_limit::RateGate;

use crate::error::Result;
use crate::types::{FilingReference, ParsedFiling, PriceData};
use async_trait::async_trait;
use std::collections::HashMap;

/// Source of Form 4 filings
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FilingSource: Send + Sync {
    /// Most recent filings, newest first, de-duplicated and capped at `max`.
    /// Fails only when the first listing page cannot be read.
    async fn list_recent_filings(&self, max: usize) -> Result<Vec<FilingReference>>;

    /// Locate and parse the filing's ownership document
    async fn parse_filing(&self, accession_id: &str, cik: &str) -> Result<ParsedFiling>;

    /// SIC description for a company, `None` for individuals or when absent
    async fn issuer_classification(&self, cik: &str) -> Result<Option<String>>;
}

/// Source of current prices
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn get_price(&self, ticker: &str) -> Option<PriceData>;

    /// Sequential lookups; tickers without data are absent from the map
    async fn get_batch(&self, tickers: &[String]) -> HashMap<String, PriceData>;
}
