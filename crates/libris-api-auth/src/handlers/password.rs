//! Password endpoints.
//!
//! POST /auth/password/otp - Exchange a one-time password.
//! POST /auth/password/forgot - Request a new one-time password.

use crate::error::ApiResult;
use crate::extract::FormOrJson;
use crate::models::{ForgotPasswordRequest, OtpPasswordRequest, StatusResponse};
use crate::router::AuthState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use libris_sync::SyncError;
use tracing::{debug, warn};
use validator::Validate;

pub async fn otp_password_handler(
    State(state): State<AuthState>,
    FormOrJson(request): FormOrJson<OtpPasswordRequest>,
) -> ApiResult<Json<StatusResponse>> {
    request.validate()?;
    state
        .login
        .set_password_via_otp(
            &request.username,
            &request.otp,
            &request.new_password,
            &request.confirmation,
        )
        .await?;
    Ok(Json(StatusResponse {
        status: "password_set",
    }))
}

/// Answers 202 for every well-formed request so the response does not
/// reveal whether the username and email matched.
pub async fn forgot_password_handler(
    State(state): State<AuthState>,
    FormOrJson(request): FormOrJson<ForgotPasswordRequest>,
) -> ApiResult<(StatusCode, Json<StatusResponse>)> {
    request.validate()?;
    if !request.username.trim().is_empty() {
        match state
            .synchronizer
            .reset_password(request.username.trim(), request.email.trim())
            .await
        {
            Ok(notified) => debug!(notified, "Password reset processed"),
            Err(SyncError::PatronNotFound(_)) => debug!("Password reset for unknown patron"),
            Err(e) => warn!(error = %e, "Password reset failed"),
        }
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(StatusResponse { status: "accepted" }),
    ))
}
