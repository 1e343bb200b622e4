//! Error types for callflow-core

use thiserror::Error;

/// Main error type for the callflow-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Call API error (transport or response body)
    #[error("API error: {0}")]
    Api(String),

    /// Call API answered with a non-success status
    #[error("API error: status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Call not found
    #[error("call not found: {0}")]
    CallNotFound(String),
}

/// Result type alias for callflow-core
pub type Result<T> = std::result::Result<T, Error>;
