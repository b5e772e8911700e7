//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping internal errors to appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use quarry_core::error::QuarryError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 422 Unprocessable Entity - the upload could not be turned into text.
    UnprocessableEntity(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 503 Service Unavailable - embedding provider not reachable.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::UnprocessableEntity(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable_entity", msg)
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<QuarryError> for ApiError {
    fn from(err: QuarryError) -> Self {
        match err {
            QuarryError::InvalidParameters(msg) => ApiError::BadRequest(msg),
            QuarryError::NotFound(msg) => ApiError::NotFound(msg),
            QuarryError::Extraction(msg) => ApiError::UnprocessableEntity(msg),
            QuarryError::ProviderUnavailable(msg) => ApiError::ServiceUnavailable(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarry_error_mapping() {
        let cases = [
            (
                QuarryError::InvalidParameters("top_k".into()),
                StatusCode::BAD_REQUEST,
            ),
            (QuarryError::NotFound("doc".into()), StatusCode::NOT_FOUND),
            (
                QuarryError::Extraction("bad bytes".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                QuarryError::ProviderUnavailable("offline".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                QuarryError::Storage("poisoned".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                QuarryError::NoValidEmbeddings,
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }
}
