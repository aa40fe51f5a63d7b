//! Error types for the caching proxy
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Proxy Error Enum ==
/// Unified error type for the caching proxy.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// The upstream host could not be reached or the transfer failed
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// The external key-value store reported an error
    #[error("Storage error: {0}")]
    Storage(#[from] redis::RedisError),

    /// A stored record could not be decoded
    #[error("Corrupt cache record for {key}: {reason}")]
    CorruptRecord { key: String, reason: String },

    /// Invalid or missing configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::Upstream(err) if err.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Storage(_)
            | ProxyError::CorruptRecord { .. }
            | ProxyError::Config(_)
            | ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caching proxy.
pub type Result<T> = std::result::Result<T, ProxyError>;
