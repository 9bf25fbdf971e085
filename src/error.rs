//! Error types for the cache layer
//!
//! Three families: cache-store failures (always swallowed), relational
//! failures (surface as a failed mutation) and engagement request errors
//! (client-facing).

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Failure talking to the cache store.
///
/// Never returned to callers of the accessor, dispatcher or rate limiter;
/// those log it and fall back to the relational store.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backend did not answer within the cache timeout
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    /// Backend is unreachable
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// Cached bytes could not be encoded or decoded
    #[error("cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other backend failure
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            CacheError::Timeout(Duration::ZERO)
        } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            CacheError::Unavailable(err.to_string())
        } else {
            CacheError::Backend(err.to_string())
        }
    }
}

// == Store Error Enum ==
/// Failure inside the relational store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Transaction could not be committed; nothing was applied
    #[error("transaction aborted: {0}")]
    Aborted(String),
}

// == Engagement Error Enum ==
/// Errors returned by like/download operations.
#[derive(Error, Debug)]
pub enum EngagementError {
    /// No usable caller identity, a like cannot be deduplicated
    #[error("client identity could not be resolved")]
    MissingIdentity,

    /// Entity absent or not in a likeable state
    #[error("entity {0} not found")]
    NotFound(i64),

    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// The mutation itself did not happen
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngagementError {
    /// HTTP status an adapter should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            EngagementError::MissingIdentity => StatusCode::BAD_REQUEST,
            EngagementError::NotFound(_) => StatusCode::NOT_FOUND,
            EngagementError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            EngagementError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for EngagementError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            // Don't leak database details to anonymous callers
            EngagementError::Store(_) => "internal error".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for engagement operations.
pub type Result<T> = std::result::Result<T, EngagementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            EngagementError::MissingIdentity.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(EngagementError::NotFound(7).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            EngagementError::RateLimited {
                retry_after: Duration::from_secs(60)
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            EngagementError::Store(StoreError::Unavailable("down".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_error_response_hides_details() {
        let response =
            EngagementError::Store(StoreError::Aborted("secret table".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
