//! Error types for report ingestion.
//!
//! `IngestError` covers everything that aborts a read. Conditions reported by
//! the server itself (SUSHI exceptions) are not errors at this level; they are
//! collected on the [`ReadResult`](crate::ingest::ReadResult) and only turned
//! into an `IngestError::Sushi` by the caller-level policy.

use thiserror::Error;

/// Main error type for the ingestion library.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The document does not have the shape of a COUNTER report.
    ///
    /// `content` carries the raw document (or the offending item) for diagnostics.
    #[error("{message}")]
    Format { message: String, content: String },

    /// A tabular export declares a report type or release we cannot read.
    #[error("Unsupported {field}: '{value}'")]
    UnsupportedReport { field: &'static str, value: String },

    /// Terminal failure raised from server-reported exceptions.
    #[error("{message}")]
    Sushi { message: String, content: Vec<String> },

    /// Plain JSON parsing failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Streaming JSON reader failed (malformed or truncated document).
    #[error("JSON stream reading failed: {0}")]
    JsonRead(#[from] struson::reader::ReaderError),

    /// Streaming JSON reader could not materialize a value.
    #[error("JSON stream deserialization failed: {0}")]
    JsonDeserialize(#[from] struson::serde::DeserializerError),

    /// CSV reading failed.
    #[error("CSV reading failed: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Build a format error with attached raw content.
    pub fn format(message: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
            content: content.into(),
        }
    }

    /// Raw content attached to the error, if any.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Format { content, .. } => Some(content),
            _ => None,
        }
    }
}

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_display() {
        let err = IngestError::format("Incorrect format", "{\"foo\": 1}");
        assert_eq!(err.to_string(), "Incorrect format");
        assert_eq!(err.content(), Some("{\"foo\": 1}"));
    }

    #[test]
    fn test_unsupported_report_display() {
        let err = IngestError::UnsupportedReport {
            field: "COUNTER release",
            value: "4".to_string(),
        };
        assert_eq!(err.to_string(), "Unsupported COUNTER release: '4'");
        assert!(err.content().is_none());
    }
}
