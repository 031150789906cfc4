//! Axum router setup for authentication endpoints.

use crate::handlers::{
    forgot_password_handler, login_handler, otp_password_handler, register_handler,
    user_auth_handler,
};
use axum::routing::post;
use axum::Router;
use libris_sync::{IdentitySynchronizer, LoginService};
use std::sync::Arc;

/// Shared state for authentication handlers.
#[derive(Clone)]
pub struct AuthState {
    pub login: Arc<LoginService>,
    pub synchronizer: Arc<IdentitySynchronizer>,
}

impl AuthState {
    pub fn new(login: LoginService, synchronizer: IdentitySynchronizer) -> Self {
        Self {
            login: Arc::new(login),
            synchronizer: Arc::new(synchronizer),
        }
    }
}

/// Creates the authentication router.
pub fn auth_router(state: AuthState) -> Router {
    Router::new()
        .route("/auth/user", post(user_auth_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/password/otp", post(otp_password_handler))
        .route("/auth/password/forgot", post(forgot_password_handler))
        .route("/auth/register", post(register_handler))
        .with_state(state)
}
