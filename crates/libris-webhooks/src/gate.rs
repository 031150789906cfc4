//! Webhook security gate.
//!
//! Runs before any webhook reaches the synchronizer:
//! feature switch, signature check, then action classification.

use crate::error::{GateError, GateResult};
use crate::signature::verify_signature;
use libris_core::{ConfigError, ConfigSection};
use libris_sync::WebhookUser;
use serde::Deserialize;
use tracing::{debug, error, warn};

/// Gate settings.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct GateConfig {
    pub enabled: bool,
    /// Shared HMAC secret. Required whenever a request needs verifying.
    pub secret: Option<String>,
}

impl std::fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateConfig")
            .field("enabled", &self.enabled)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl GateConfig {
    /// Read `enabled` (default false) and `secret`.
    pub fn from_section(section: &ConfigSection) -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: section.get_bool("enabled", false)?,
            secret: section.get("secret").map(String::from),
        })
    }
}

/// Classified webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAction {
    /// Patron change to synchronize.
    User(WebhookUser),
    /// Informational (`NOTIFICATION`, `JOB_END`); acknowledged, nothing stored.
    Acknowledge(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    action: String,
    #[serde(default)]
    webhook_user: Option<WebhookUser>,
}

/// Verifies and classifies inbound webhooks.
#[derive(Debug, Clone)]
pub struct WebhookGate {
    config: GateConfig,
}

impl WebhookGate {
    #[must_use]
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    /// Reject everything while the feature is switched off.
    pub fn ensure_enabled(&self) -> GateResult<()> {
        if self.config.enabled {
            Ok(())
        } else {
            debug!("Webhook received while disabled");
            Err(GateError::Disabled)
        }
    }

    /// Check the signature over the raw request body.
    ///
    /// # Errors
    ///
    /// - `GateError::Configuration` when no secret is configured.
    /// - `GateError::MissingSignature` / `GateError::InvalidSignature`.
    pub fn verify(&self, signature: Option<&str>, body: &[u8]) -> GateResult<()> {
        let Some(secret) = self.config.secret.as_deref() else {
            error!("Webhook signing secret is not configured, rejecting request");
            return Err(GateError::Configuration);
        };
        let signature = signature
            .filter(|s| !s.trim().is_empty())
            .ok_or(GateError::MissingSignature)?;
        if verify_signature(secret, body, signature) {
            Ok(())
        } else {
            warn!(body_len = body.len(), "Webhook signature mismatch");
            Err(GateError::InvalidSignature)
        }
    }

    /// Parse the verified body and decide what to do with it.
    pub fn classify(&self, body: &[u8]) -> GateResult<WebhookAction> {
        let envelope: Envelope = serde_json::from_slice(body)
            .map_err(|e| GateError::InvalidPayload(format!("body is not a webhook: {e}")))?;

        match envelope.action.trim().to_ascii_uppercase().as_str() {
            "USER" => envelope
                .webhook_user
                .map(WebhookAction::User)
                .ok_or_else(|| GateError::InvalidPayload("USER webhook without webhook_user".into())),
            "NOTIFICATION" | "JOB_END" => Ok(WebhookAction::Acknowledge(envelope.action)),
            _ => Err(GateError::UnsupportedAction(envelope.action)),
        }
    }
}
