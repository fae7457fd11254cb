//! Error Types
//!
//! `ApiError` covers everything that can go wrong on the wire; `TreeError`
//! is what the store hands back to the presentation layer.

use thiserror::Error;

/// Result type for HTTP/backend calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for store operations
pub type TreeResult<T> = Result<T, TreeError>;

/// Network-level failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Non-2xx response; carries the server-provided message
    #[error("API error: {message}")]
    Status { status: u16, message: String },
    /// Request never produced a response
    #[error("Request failed: {0}")]
    Transport(String),
    /// Response body was not the JSON we expected
    #[error("Invalid response: {0}")]
    Decode(String),
    /// Request could not be built from the given input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        ApiError::Status {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

/// Store-level errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error(transparent)]
    Network(#[from] ApiError),
    #[error("Nodes not found: {0}")]
    NotFound(String),
    #[error("Invalid move: {0}")]
    InvalidMove(String),
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
