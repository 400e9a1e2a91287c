//! Error types for document ingestion and the analysis pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for docscope operations
pub type Result<T> = std::result::Result<T, Error>;

/// docscope errors
#[derive(Debug, Error)]
pub enum Error {
    /// Missing input file, or unknown job/document id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Extension outside the supported set
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Container could not be parsed (corrupt zip, broken PDF, bad CSV record)
    #[error("Malformed input '{filename}': {message}")]
    MalformedInput { filename: String, message: String },

    /// An external analysis or captioning call failed
    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    /// An extracted asset or staged upload could not be persisted
    #[error("Storage failure: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected request (missing identity, empty payload)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Upload exceeds the per-call ceiling
    #[error("Payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a malformed input error
    pub fn malformed(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create a collaborator error
    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::Collaborator(message.into())
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            Error::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Not found: {}", what),
            ),
            Error::UnsupportedFormat(ext) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_format",
                format!("Unsupported format: {}", ext),
            ),
            Error::MalformedInput { filename, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "malformed_input",
                format!("Failed to parse '{}': {}", filename, message),
            ),
            Error::Collaborator(msg) => {
                (StatusCode::BAD_GATEWAY, "collaborator_error", msg.clone())
            }
            Error::Storage(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg.clone())
            }
            Error::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", msg.clone()),
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            Error::PayloadTooLarge { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                self.to_string(),
            ),
            Error::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_error",
                err.to_string(),
            ),
            Error::Json(err) => (StatusCode::BAD_REQUEST, "json_error", err.to_string()),
            Error::Http(err) => (
                StatusCode::BAD_GATEWAY,
                "http_error",
                err.to_string(),
            ),
            Error::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
