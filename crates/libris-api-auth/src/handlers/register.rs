//! Self-registration endpoint handler.
//!
//! POST /auth/register - Create a patron in the ILS and sign them up locally.

use crate::error::ApiResult;
use crate::extract::FormOrJson;
use crate::models::{RegisterRequest, RegisterResponse};
use crate::router::AuthState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use libris_sync::Registration;
use tracing::info;
use validator::Validate;

/// Handle self-registration.
///
/// # Errors
///
/// - 400 Bad Request: invalid input or the ILS refused the patron
/// - 409 Conflict: the generated card number is already taken locally
/// - 501 Not Implemented: the configured ILS cannot create patrons
pub async fn register_handler(
    State(state): State<AuthState>,
    FormOrJson(request): FormOrJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    request.validate()?;

    let outcome = state
        .synchronizer
        .register(&Registration {
            first_name: request.first_name,
            last_name: request.last_name,
            email: request.email,
            password: request.password,
        })
        .await?;
    info!(external_id = %outcome.external_id, "Self-registration completed");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            status: "registered",
            external_id: outcome.external_id,
            username: outcome.barcode.unwrap_or_default(),
        }),
    ))
}
