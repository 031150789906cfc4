//! Error types for the webhook endpoint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use libris_sync::SyncError;
use serde::Serialize;

/// Webhook gate and processing errors.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// No signing secret configured. Never falls back to accepting traffic.
    #[error("Webhook signing secret is not configured")]
    Configuration,

    #[error("Missing webhook signature")]
    MissingSignature,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Webhook processing is disabled")]
    Disabled,

    #[error("Invalid request: {0}")]
    InvalidPayload(String),

    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// JSON error response returned by the webhook endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
}

impl GateError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::Configuration | GateError::MissingSignature | GateError::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }
            GateError::Disabled => StatusCode::FORBIDDEN,
            GateError::InvalidPayload(_) | GateError::UnsupportedAction(_) => {
                StatusCode::BAD_REQUEST
            }
            GateError::Sync(e) => StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            GateError::Configuration => "configuration_error",
            GateError::MissingSignature => "missing_signature",
            GateError::InvalidSignature => "invalid_signature",
            GateError::Disabled => "disabled",
            GateError::InvalidPayload(_) => "invalid_payload",
            GateError::UnsupportedAction(_) => "unsupported_action",
            GateError::Sync(e) => e.code(),
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Webhook processing failed");
        }

        let body = ErrorResponse {
            error: self.error_type().to_string(),
            message: self.to_string(),
            status: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type GateResult<T> = Result<T, GateError>;
