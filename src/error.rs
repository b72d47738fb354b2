//! Error handling for roaming report operations.
//!
//! Provides error types with context for credential loading, API calls,
//! table transformations, scraping and report writing failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoamingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Spreadsheet write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Spreadsheet read error in {path}: {reason}")]
    Spreadsheet { path: PathBuf, reason: String },

    #[error("Required input not found: {path}")]
    MissingInput { path: PathBuf },

    #[error("Missing column '{column}' in {path}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Authentication failed for client {client_id}: {reason}")]
    Authentication { client_id: String, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid pipeline: {reason}")]
    InvalidPipeline { reason: String },

    #[error("Scrape failed for '{query}': {reason}")]
    Scrape { query: String, reason: String },

    #[error("Processing interrupted: {reason}")]
    Interrupted { reason: String },
}

impl RoamingError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn scrape(query: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Scrape {
            query: query.into(),
            reason: reason.into(),
        }
    }

    pub fn interrupted(reason: impl Into<String>) -> Self {
        Self::Interrupted {
            reason: reason.into(),
        }
    }

    pub fn invalid_pipeline(reason: impl Into<String>) -> Self {
        Self::InvalidPipeline {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RoamingError>;
