//! Inbound ILS webhooks.
//!
//! Every request passes the [`WebhookGate`] (feature switch, HMAC-SHA256
//! over the raw body, action classification) before patron changes reach
//! the [`libris_sync::IdentitySynchronizer`].

pub mod error;
pub mod gate;
pub mod handlers;
pub mod router;
pub mod signature;

pub use error::{ErrorResponse, GateError, GateResult};
pub use gate::{GateConfig, WebhookAction, WebhookGate};
pub use router::{webhooks_router, WebhookState};
pub use signature::{compute_signature, verify_signature, SIGNATURE_HEADER};
