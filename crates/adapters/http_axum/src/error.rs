//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use funnelhub_domain::error::{FunnelError, ValidationError};

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`FunnelError`] and request-level problems to an HTTP response.
#[derive(Debug)]
pub enum ApiError {
    Funnel(FunnelError),
    /// The request itself is malformed (missing header, bad query value).
    BadRequest(String),
}

impl From<FunnelError> for ApiError {
    fn from(err: FunnelError) -> Self {
        Self::Funnel(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Funnel(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Self::Funnel(FunnelError::Validation(err)) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Funnel(FunnelError::NotFound(err)) => (StatusCode::NOT_FOUND, err.to_string()),
            Self::Funnel(FunnelError::Conflict(err)) => (StatusCode::CONFLICT, err.to_string()),
            Self::Funnel(FunnelError::Storage(err)) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            Self::Funnel(FunnelError::Integration(err)) => {
                tracing::error!(error = %err, "integration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
