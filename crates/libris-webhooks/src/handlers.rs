//! Webhook HTTP handlers.

use crate::error::{GateError, GateResult};
use crate::gate::WebhookAction;
use crate::router::WebhookState;
use crate::signature::SIGNATURE_HEADER;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct ChallengeQuery {
    pub challenge: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub challenge: String,
}

/// `GET /webhooks/ils?challenge=...`: subscription handshake.
pub async fn challenge_handler(
    State(state): State<WebhookState>,
    Query(query): Query<ChallengeQuery>,
) -> GateResult<Json<ChallengeResponse>> {
    state.gate.ensure_enabled()?;
    let challenge = query
        .challenge
        .ok_or_else(|| GateError::InvalidPayload("challenge parameter is required".into()))?;
    Ok(Json(ChallengeResponse { challenge }))
}

/// `POST /webhooks/ils`: signed patron notifications.
///
/// A `challenge` query parameter short-circuits to the handshake echo and
/// is the only way past the signature check.
pub async fn receive_handler(
    State(state): State<WebhookState>,
    Query(query): Query<ChallengeQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> GateResult<Json<Value>> {
    state.gate.ensure_enabled()?;
    if let Some(challenge) = query.challenge {
        return Ok(Json(json!({ "challenge": challenge })));
    }

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    state.gate.verify(signature, &body)?;

    match state.gate.classify(&body)? {
        WebhookAction::Acknowledge(action) => {
            info!(action = %action, "Webhook acknowledged");
            Ok(Json(json!({ "status": "acknowledged", "action": action })))
        }
        WebhookAction::User(event) => {
            let outcome = state.synchronizer.handle(&event, signature).await?;
            Ok(Json(json!({ "status": "ok", "result": outcome })))
        }
    }
}
