//! Error types for the order service
//!
//! Provides unified error handling using thiserror. Module level errors
//! (store, serialization) convert into [`AppError`] so handlers and the
//! pipeline can propagate them with `?`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;
use crate::store::StoreError;

// == App Error Enum ==
/// Unified error type for the order service.
#[derive(Error, Debug)]
pub enum AppError {
    /// Order not found in cache
    #[error("Order with UID '{0}' not found")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Cache backend failure (remote cache unreachable, closed pool, ...)
    #[error("Cache error: {0}")]
    Cache(String),

    /// Durable store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Record (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// == IntoResponse Implementation ==
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            _ => {
                error!(error = %self, "Request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the order service.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = AppError::NotFound("abc".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_request_maps_to_400() {
        let response = AppError::InvalidRequest("too long".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_backend_errors_map_to_500() {
        let response = AppError::Cache("connection refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = AppError::Store(StoreError::Backend("pool timeout".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_store_error_converts() {
        fn persist() -> Result<()> {
            Err(StoreError::Duplicate("abc".to_string()))?
        }
        assert!(matches!(persist(), Err(AppError::Store(StoreError::Duplicate(_)))));
    }

    #[test]
    fn test_not_found_message_names_order() {
        let err = AppError::NotFound("b563feb7".to_string());
        assert_eq!(err.to_string(), "Order with UID 'b563feb7' not found");
    }
}
