//! Error types for the cache layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::cache::ClearReport;
use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache layer.
///
/// A disabled cache is not an error: lookups against a disabled cache simply
/// report a miss.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Unexpected fault inside a store operation (poisoned lock, I/O, serialization)
    #[error("Store failure: {0}")]
    StoreFailure(String),

    /// Invalidation request carried neither a key nor enough pattern attributes
    #[error("Missing invalidation criteria: {0}")]
    MissingCriteria(String),

    /// An option override had the wrong shape for a known option key
    #[error("Invalid option `{key}`: {reason}")]
    InvalidOption { key: String, reason: String },

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Entry cannot fit inside the configured byte limit
    #[error("Cache full: {0}")]
    CacheFull(String),

    /// Requested content does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// At least one store failed during a fan-out clear
    #[error("Cache clear failed: {0}")]
    ClearFailed(Box<ClearReport>),
}

impl CacheError {
    /// Wraps any displayable fault as a `StoreFailure`.
    pub fn store(err: impl std::fmt::Display) -> Self {
        CacheError::StoreFailure(err.to_string())
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::store(err)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::store(err)
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::MissingCriteria(_)
            | CacheError::InvalidOption { .. }
            | CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::CacheFull(_) => StatusCode::INSUFFICIENT_STORAGE,
            CacheError::StoreFailure(_) | CacheError::ClearFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache layer.
pub type Result<T> = std::result::Result<T, CacheError>;
