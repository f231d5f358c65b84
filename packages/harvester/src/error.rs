//! Error types for the harvester.
//!
//! Uses the dual-error pattern: `HarvesterError` for everything the client
//! and CLI can fail on, wrapping `IngestError` for failures while reading
//! a downloaded report.

use counter_ingest::IngestError;
use thiserror::Error;

/// Main error type for the harvester library.
#[derive(Debug, Error)]
pub enum HarvesterError {
    /// Unknown report type or view.
    #[error("Invalid report type: '{0}'. Expected one of tr, dr, pr, ir or a standard view (e.g., tr_j1)")]
    InvalidReportType(String),

    /// Invalid month format.
    #[error("Invalid date format: '{0}'. Expected YYYY-MM (e.g., 2025-01)")]
    InvalidDate(String),

    /// Server answered with a status that carries no report.
    #[error("Unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Report URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Downloaded report could not be read.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Inconsistent or incomplete client settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credentials file could not be parsed.
    #[error("YAML parsing failed: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, HarvesterError>;
