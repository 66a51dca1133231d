//! Error types for the ingestion pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML parsing error: {0}")]
    Xml(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Filing list unavailable: {0}")]
    FilingList(String),

    #[error("Filing {accession} could not be parsed: {reason}")]
    FilingParse { accession: String, reason: String },

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Cluster detection failed: {0}")]
    ClusterDetection(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<quick_xml::DeError> for ScraperError {
    fn from(err: quick_xml::DeError) -> Self {
        ScraperError::Xml(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
