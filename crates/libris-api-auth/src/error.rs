//! Error types for the authentication endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use libris_core::AuthError;
use libris_sync::SyncError;
use serde::Serialize;
use validator::ValidationErrors;

/// Authentication API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiAuthError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl From<ValidationErrors> for ApiAuthError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .values()
            .flat_map(|errors| {
                errors
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(std::string::ToString::to_string))
            })
            .collect();
        messages.sort();
        ApiAuthError::Validation(messages.join(", "))
    }
}

/// JSON error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
}

impl ApiAuthError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiAuthError::Validation(_) | ApiAuthError::Auth(AuthError::Blank) => {
                StatusCode::BAD_REQUEST
            }
            ApiAuthError::Auth(AuthError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            ApiAuthError::Auth(AuthError::OneTimePasswordUsed) => StatusCode::CONFLICT,
            ApiAuthError::Auth(AuthError::TransportFailure(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiAuthError::Sync(SyncError::Auth(inner)) => {
                ApiAuthError::Auth(inner.clone()).status_code()
            }
            ApiAuthError::Sync(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ApiAuthError::Validation(_) => "validation_error",
            ApiAuthError::Auth(e) => e.message_key(),
            ApiAuthError::Sync(e) => e.code(),
        }
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Authentication request failed");
        }

        let body = ErrorResponse {
            error: self.error_type().to_string(),
            message: self.to_string(),
            status: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiAuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_map_to_distinct_statuses() {
        let statuses = [
            ApiAuthError::Auth(AuthError::Blank).status_code(),
            ApiAuthError::Auth(AuthError::InvalidCredentials).status_code(),
            ApiAuthError::Auth(AuthError::OneTimePasswordUsed).status_code(),
            ApiAuthError::Auth(AuthError::TransportFailure("down".into())).status_code(),
        ];
        for (i, a) in statuses.iter().enumerate() {
            for b in &statuses[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_sync_auth_error_unwrapped() {
        let err = ApiAuthError::Sync(SyncError::Auth(AuthError::OneTimePasswordUsed));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiAuthError::Sync(SyncError::PasswordMismatch).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
