//! Login endpoint handler.
//!
//! POST /auth/login - Interactive patron login.

use crate::error::ApiResult;
use crate::extract::FormOrJson;
use crate::models::{LoginRequest, LoginResponse};
use crate::router::AuthState;
use axum::extract::State;
use axum::Json;
use libris_sync::LoginOutcome;
use validator::Validate;

/// Handle patron login.
///
/// A correct one-time password answers `password_change_required`; the
/// caller must run the password-set flow before a session is issued.
pub async fn login_handler(
    State(state): State<AuthState>,
    FormOrJson(request): FormOrJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    request.validate()?;
    let outcome = state.login.login(&request.username, &request.password).await?;
    let status = match &outcome {
        LoginOutcome::Authenticated { .. } => "authenticated",
        LoginOutcome::PasswordChangeRequired { .. } => "password_change_required",
    };
    let patron = outcome.patron();
    Ok(Json(LoginResponse {
        status,
        force_password_change: outcome.force_password_change(),
        username: patron.username.clone(),
        display_name: patron.display_name.clone(),
    }))
}
