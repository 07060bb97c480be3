//! Error types for the emissions-rag pipeline

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for emissions-rag operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid client input (missing file, bad MIME type, malformed field)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A processing job is already in flight
    #[error("A document is already being processed")]
    JobInFlight,

    /// Extraction backend failure
    #[error("Extraction failed ({engine}): {message}")]
    Extraction { engine: String, message: String },

    /// Upstream rate limit; retry after the given number of seconds if known
    #[error("Rate limited by upstream service")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Transient network failure talking to an upstream service
    #[error("Network error: {0}")]
    Network(String),

    /// Embedding generation error
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Completion model error
    #[error("Completion error: {0}")]
    Completion(String),

    /// Vector index operation error
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// Relational store error
    #[error("Database error: {0}")]
    Database(String),

    /// Report record not found
    #[error("Report not found: {0}")]
    ReportNotFound(i64),

    /// Import session not found or already finished
    #[error("Import session not found: {0}")]
    ImportSessionNotFound(uuid::Uuid),

    /// Column not present in the migration allow-list
    #[error("Column not allowed: {0}")]
    ColumnNotAllowed(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an extraction error for a named engine
    pub fn extraction(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Extraction {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Error::Embedding(message.into())
    }

    /// Create a vector index error
    pub fn vector_index(message: impl Into<String>) -> Self {
        Error::VectorIndex(message.into())
    }

    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Error::Database(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }

    /// Short stable code persisted alongside job failure messages
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG",
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::JobInFlight => "JOB_IN_FLIGHT",
            Error::Extraction { .. } => "EXTRACTION",
            Error::RateLimited { .. } => "RATE_LIMITED",
            Error::Network(_) => "NETWORK",
            Error::Embedding(_) => "EMBEDDING",
            Error::Completion(_) => "COMPLETION",
            Error::VectorIndex(_) => "VECTOR_INDEX",
            Error::Database(_) => "DATABASE",
            Error::ReportNotFound(_) => "REPORT_NOT_FOUND",
            Error::ImportSessionNotFound(_) => "IMPORT_SESSION_NOT_FOUND",
            Error::ColumnNotAllowed(_) => "COLUMN_NOT_ALLOWED",
            Error::Io(_) => "IO",
            Error::Json(_) => "JSON",
            Error::Http(_) => "HTTP",
            Error::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            Error::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "invalid_input", msg.clone()),
            Error::ColumnNotAllowed(col) => (
                StatusCode::BAD_REQUEST,
                "column_not_allowed",
                format!("Column not allowed: {}", col),
            ),
            Error::JobInFlight => (
                StatusCode::CONFLICT,
                "job_in_flight",
                "A document is already being processed".to_string(),
            ),
            Error::ReportNotFound(id) => (
                StatusCode::NOT_FOUND,
                "report_not_found",
                format!("Report not found: {}", id),
            ),
            Error::ImportSessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                "import_session_not_found",
                format!("Import session not found: {}", id),
            ),
            Error::RateLimited { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "rate_limited",
                "Upstream service is rate limiting requests".to_string(),
            ),
            Error::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                msg.clone(),
            ),
            Error::Extraction { .. }
            | Error::Embedding(_)
            | Error::Completion(_)
            | Error::VectorIndex(_)
            | Error::Network(_) => (StatusCode::BAD_GATEWAY, "upstream_error", self.to_string()),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                self.to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(Error::JobInFlight.code(), "JOB_IN_FLIGHT");
        assert_eq!(
            Error::extraction("layout", "boom").code(),
            "EXTRACTION"
        );
        assert_eq!(
            Error::RateLimited {
                retry_after_secs: Some(7)
            }
            .code(),
            "RATE_LIMITED"
        );
    }

    #[test]
    fn extraction_error_formats_engine() {
        let err = Error::extraction("parse-poll", "job timed out");
        assert_eq!(
            err.to_string(),
            "Extraction failed (parse-poll): job timed out"
        );
    }
}
