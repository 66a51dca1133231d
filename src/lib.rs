//! SEC Form 4 Insider Trade Scraper
//!
//! Pulls recent Form 4 filings from EDGAR, extracts the non-derivative
//! transactions, stores them as canonical trade records and flags clusters
//! of distinct insiders trading the same ticker in the same direction.

pub mod client;
pub mod cluster;
pub mod config;
pub mod error;
pub mod industry;
pub mod normalize;
pub mod pipeline;
pub mod storage;
pub mod types;


pub use error::{Result, ScraperError};
pub use pipeline::Pipeline;
