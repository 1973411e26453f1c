use axum::{http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

use crate::csrf::InvalidReason;

/// Errors surfaced at the HTTP boundary
///
/// CSRF rejections terminate only the current request. Bodies are always
/// `{"error": <message>}`; internal details stay in the logs.
#[derive(Error, Debug)]
pub enum AppError {
    // ===== CSRF Errors =====
    #[error("CSRF validation failed: {}", .0.code())]
    Csrf(InvalidReason),

    // ===== Request Errors =====
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    // ===== Internal Server Errors =====
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Csrf(InvalidReason::Missing) => StatusCode::BAD_REQUEST,
            AppError::Csrf(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-friendly error message (without sensitive details)
    pub fn user_message(&self) -> String {
        match self {
            AppError::Csrf(InvalidReason::Missing) => "CSRF token missing".to_string(),
            AppError::Csrf(_) => "Invalid CSRF token".to_string(),
            AppError::Validation(msg) => msg.clone(),
            AppError::PayloadTooLarge(_) => "Request body too large".to_string(),
            _ => "Internal server error".to_string(),
        }
    }

    /// Get error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Csrf(reason) => reason.code(),
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Log this error with appropriate level and context
    pub fn log(&self) {
        let status = self.status_code();
        let code = self.error_code();

        if status.is_server_error() {
            tracing::error!(
                error = %self,
                error_code = %code,
                status = %status.as_u16(),
                "Server error occurred"
            );
        } else {
            tracing::debug!(
                error_code = %code,
                status = %status.as_u16(),
                "Client error occurred"
            );
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        self.log();

        let status = self.status_code();
        let body = json!({ "error": self.user_message() });

        (status, axum::Json(body)).into_response()
    }
}
