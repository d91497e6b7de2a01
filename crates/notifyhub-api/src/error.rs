//! Maps domain `AppError` to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use notifyhub_core::error::{AppError, ErrorKind};

/// Standard API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

/// `AppError` as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// Status code for the wrapped error kind.
    pub fn status(&self) -> StatusCode {
        match self.0.kind {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::ServiceUnavailable | ErrorKind::Database => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Transport => StatusCode::BAD_GATEWAY,
            ErrorKind::Serialization | ErrorKind::Configuration | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        let body = ApiErrorResponse {
            error: self.0.code(),
            message: self.0.message.clone(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError(AppError::validation("bad")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(AppError::database("down")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError(AppError::internal("oops")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
