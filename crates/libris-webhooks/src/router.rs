//! Axum router setup for the ILS webhook endpoint.

use crate::gate::WebhookGate;
use crate::handlers::{challenge_handler, receive_handler};
use axum::routing::post;
use axum::Router;
use libris_sync::IdentitySynchronizer;
use std::sync::Arc;

/// Shared state for webhook handlers.
#[derive(Clone)]
pub struct WebhookState {
    pub gate: Arc<WebhookGate>,
    pub synchronizer: Arc<IdentitySynchronizer>,
}

impl WebhookState {
    pub fn new(gate: WebhookGate, synchronizer: IdentitySynchronizer) -> Self {
        Self {
            gate: Arc::new(gate),
            synchronizer: Arc::new(synchronizer),
        }
    }
}

/// `POST`/`GET /webhooks/ils`. Other methods answer 405.
pub fn webhooks_router(state: WebhookState) -> Router {
    Router::new()
        .route(
            "/webhooks/ils",
            post(receive_handler).get(challenge_handler),
        )
        .with_state(state)
}
