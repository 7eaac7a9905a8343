//! Error types for the cache core
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for every cache adapter.
///
/// Storage failures of mutating operations are reported as `Ok(false)` by the
/// adapters, so only argument, lifecycle and remote failures surface here.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is not a non-empty string
    #[error("The cache key must be a non-empty string")]
    InvalidKey,

    /// Key batch is not a finite collection of non-empty strings
    #[error("The cache keys must be a collection of non-empty strings")]
    InvalidKeys,

    /// TTL cannot be normalized to seconds
    #[error("Expiration must be an integer, a duration or null, {0} given")]
    InvalidTtl(String),

    /// Value or snapshot could not be encoded/decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Filesystem or mapping failure outside the boolean result channel
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote store connectivity or protocol failure
    #[error("Remote store error: {0}")]
    Remote(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session handler used before `open`
    #[error("Session handler is not open")]
    HandlerClosed,
}

impl CacheError {
    /// Returns true for errors raised by argument validation.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            CacheError::InvalidKey | CacheError::InvalidKeys | CacheError::InvalidTtl(_)
        )
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Remote(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidKey | CacheError::InvalidKeys | CacheError::InvalidTtl(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::Remote(_) => StatusCode::BAD_GATEWAY,
            CacheError::Serialization(_)
            | CacheError::Io(_)
            | CacheError::Config(_)
            | CacheError::HandlerClosed => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache core.
pub type Result<T> = std::result::Result<T, CacheError>;
