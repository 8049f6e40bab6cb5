//! Custom error types for the gallery service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Failures of the sharing core, independent of HTTP
#[derive(Error, Debug)]
pub enum GalleryError {
    /// The referenced media item does not exist
    #[error("Media item not found")]
    NotFound,

    /// A secret item was read without its current access token
    #[error("Access denied")]
    AccessDenied,

    /// The media store is unreachable or did not answer in time
    #[error("Media store unavailable: {0}")]
    Transient(String),

    /// Malformed input, rejected before touching the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Any other failure reported by the media store
    #[error("Storage error: {0}")]
    Storage(#[source] DatabaseError),
}

impl From<DatabaseError> for GalleryError {
    fn from(e: DatabaseError) -> Self {
        if e.is_transient() {
            GalleryError::Transient(e.to_string())
        } else {
            GalleryError::Storage(e)
        }
    }
}

/// Type alias for results of the sharing core
pub type GalleryResult<T> = Result<T, GalleryError>;

/// Custom error type for the HTTP layer
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid admin credentials
    #[error("Unauthorized")]
    Unauthorized,

    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource exists but the caller may not read it
    #[error("Forbidden")]
    Forbidden,

    /// Backing store unavailable, the caller may retry
    #[error("Service unavailable")]
    ServiceUnavailable,

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,
}

impl ApiError {
    /// Map a core failure onto an HTTP error.
    ///
    /// With `conceal_access_denied` a denied read is reported exactly like a
    /// missing item, so ids of private content cannot be probed.
    pub fn from_gallery(error: GalleryError, conceal_access_denied: bool) -> Self {
        match error {
            GalleryError::NotFound => ApiError::NotFound("Media item not found".to_string()),
            GalleryError::AccessDenied if conceal_access_denied => {
                ApiError::NotFound("Media item not found".to_string())
            }
            GalleryError::AccessDenied => ApiError::Forbidden,
            GalleryError::Validation(msg) => ApiError::BadRequest(msg),
            GalleryError::Transient(msg) => {
                warn!("Media store unavailable: {}", msg);
                ApiError::ServiceUnavailable
            }
            GalleryError::Storage(e) => {
                error!("Media store failure: {}", e);
                ApiError::InternalServerError
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Access denied".to_string()),
            ApiError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Media store unavailable, please retry".to_string(),
            ),
            ApiError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_is_concealed_as_not_found() {
        let concealed = ApiError::from_gallery(GalleryError::AccessDenied, true);
        let missing = ApiError::from_gallery(GalleryError::NotFound, true);

        assert_eq!(concealed.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_denied_is_forbidden_when_not_concealed() {
        let error = ApiError::from_gallery(GalleryError::AccessDenied, false);
        assert_eq!(error.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_transient_store_errors_map_to_unavailable() {
        let error: GalleryError = DatabaseError::Query(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(error, GalleryError::Transient(_)));

        let response = ApiError::from_gallery(error, true).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_permanent_store_errors_map_to_internal() {
        let error: GalleryError = DatabaseError::Decode("bad row".to_string()).into();
        assert!(matches!(error, GalleryError::Storage(_)));

        let response = ApiError::from_gallery(error, true).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
