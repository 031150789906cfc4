//! Identity synchronizer.
//!
//! Applies ILS patron webhooks to the local credential store:
//!
//! - `CREATE` provisions a patron with a one-time password. When the ILS did
//!   not assign a barcode, one is generated and written back before anything
//!   is stored locally. A rejected write-back aborts the whole operation.
//! - `UPDATE` touches contact fields only.
//! - `DELETE` removes the local row.
//!
//! Self-registration runs the other way: the patron is created in the ILS
//! first and only then stored locally with the password they chose.
//!
//! Webhooks are delivered at least once, so every handler is safe to repeat:
//! a `CREATE` for a known external id is handled as an `UPDATE`, and so is a
//! `CREATE` that loses an insert race to a concurrent delivery. A barcode
//! already used by a patron of another external id is a conflict.

use crate::config::SyncConfig;
use crate::email::{EmailMessage, EmailSender};
use crate::error::SyncError;
use crate::payload::{SyncMethod, WebhookUser};
use chrono::Utc;
use libris_auth::{fallback_entropy, generate_one_time_password};
use libris_db::{CredentialStore, Patron, PatronPatch, StoreError, Upserted};
use libris_ils::{IlsDriver, IlsError, PatronProfile, ProfileUpdate};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// What a webhook did to the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Created,
    Updated,
    Deleted,
}

/// Result of a processed webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub action: SyncAction,
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    /// The patron was emailed (only for provisioning).
    pub notified: bool,
}

/// A patron signing themselves up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

/// Drives the credential store from ILS notifications.
#[derive(Clone)]
pub struct IdentitySynchronizer {
    store: CredentialStore,
    driver: Arc<dyn IlsDriver>,
    mailer: Arc<dyn EmailSender>,
    config: SyncConfig,
}

impl std::fmt::Debug for IdentitySynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentitySynchronizer")
            .field("driver", &self.driver.dialect())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IdentitySynchronizer {
    pub fn new(
        store: CredentialStore,
        driver: Arc<dyn IlsDriver>,
        mailer: Arc<dyn EmailSender>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            driver,
            mailer,
            config,
        }
    }

    /// Apply one `webhook_user` event.
    ///
    /// `signature` is the verified request signature; it seeds barcode
    /// generation when present.
    #[instrument(skip(self, event, signature), fields(method = %event.method, external_id = %event.external_id()))]
    pub async fn handle(
        &self,
        event: &WebhookUser,
        signature: Option<&str>,
    ) -> Result<SyncOutcome, SyncError> {
        let method = event.method();
        if !matches!(method, SyncMethod::Other(_)) && event.external_id().is_empty() {
            return Err(SyncError::InvalidPayload("user.primary_id is missing".into()));
        }

        match method {
            SyncMethod::Create => self.create(event, signature).await,
            SyncMethod::Update => self.update(event).await,
            SyncMethod::Delete => self.delete(event.external_id()).await,
            SyncMethod::Other(name) => {
                warn!(method = %name, "Unsupported webhook method");
                Err(SyncError::UnsupportedOperation(name))
            }
        }
    }

    async fn create(
        &self,
        event: &WebhookUser,
        signature: Option<&str>,
    ) -> Result<SyncOutcome, SyncError> {
        let external_id = event.external_id();
        if self.store.find_by_external_id(external_id).await?.is_some() {
            info!("CREATE for a known patron, applying as UPDATE");
            return self.update(event).await;
        }

        let user = &event.user;
        let (barcode, generated) = match user.barcode() {
            Some(existing) => (existing.to_string(), false),
            None => (
                self.config.barcode.generate(&self.entropy(event, signature)),
                true,
            ),
        };

        if let Some(holder) = self.store.find_by_username(&barcode).await? {
            if let Some(linked) = holder.external_id.as_deref().filter(|id| *id != external_id) {
                warn!(barcode = %barcode, linked, "Barcode already belongs to another patron");
                return Err(StoreError::IdentityConflict {
                    username: barcode,
                    existing: linked.to_string(),
                    requested: external_id.to_string(),
                }
                .into());
            }
        }

        if generated {
            // The ILS must know the barcode before it becomes a local login.
            self.driver
                .update_profile(external_id, &ProfileUpdate::default().with_barcode(&barcode))
                .await
                .map_err(|e| {
                    warn!(error = %e, "Barcode write-back rejected, aborting CREATE");
                    SyncError::write_back(e)
                })?;
            info!(barcode = %barcode, "Generated barcode written back to ILS");
        }

        let otp = generate_one_time_password(self.config.otp_length);
        let mut patch = PatronPatch::new()
            .with_external_id(external_id)
            .with_username(&barcode)
            .with_password(&otp)
            .with_one_time_password(true)
            .with_force_password_change(false);
        if let Some(name) = user.display_name() {
            patch = patch.with_display_name(name);
        }
        if let Some(email) = user.preferred_email() {
            patch = patch.with_email(email);
        }

        let upserted = self
            .store
            .upsert(patch, true)
            .await?
            .ok_or_else(|| SyncError::PatronNotFound(external_id.to_string()))?;

        let patron = match upserted {
            Upserted::Created(patron) => patron,
            Upserted::Updated(patron) => {
                // A concurrent delivery provisioned first; this one is an UPDATE.
                info!(local_id = %patron.local_id, "Concurrent CREATE applied as UPDATE");
                return Ok(SyncOutcome {
                    action: SyncAction::Updated,
                    external_id: external_id.to_string(),
                    barcode: None,
                    notified: false,
                });
            }
        };
        info!(local_id = %patron.local_id, "Patron provisioned");

        let notified = self.send_one_time_password(&patron, &otp).await;
        Ok(SyncOutcome {
            action: SyncAction::Created,
            external_id: external_id.to_string(),
            barcode: Some(barcode),
            notified,
        })
    }

    async fn update(&self, event: &WebhookUser) -> Result<SyncOutcome, SyncError> {
        let external_id = event.external_id();
        let mut patch = PatronPatch::new().with_external_id(external_id);
        if let Some(name) = event.user.display_name() {
            patch = patch.with_display_name(name);
        }
        if let Some(email) = event.user.preferred_email() {
            patch = patch.with_email(email);
        }

        let patron = self
            .store
            .create_or_update(patch, false)
            .await?
            .ok_or_else(|| SyncError::PatronNotFound(external_id.to_string()))?;
        info!(local_id = %patron.local_id, "Patron contact fields updated");

        Ok(SyncOutcome {
            action: SyncAction::Updated,
            external_id: external_id.to_string(),
            barcode: None,
            notified: false,
        })
    }

    async fn delete(&self, external_id: &str) -> Result<SyncOutcome, SyncError> {
        if !self.store.delete_by_external_id(external_id).await? {
            return Err(SyncError::PatronNotFound(external_id.to_string()));
        }
        Ok(SyncOutcome {
            action: SyncAction::Deleted,
            external_id: external_id.to_string(),
            barcode: None,
            notified: false,
        })
    }

    /// Issue a fresh one-time password to a patron who proved their
    /// username and email. Returns whether the email went out.
    ///
    /// # Errors
    ///
    /// `SyncError::PatronNotFound` when username and email do not match a
    /// patron.
    #[instrument(skip(self, email))]
    pub async fn reset_password(&self, username: &str, email: &str) -> Result<bool, SyncError> {
        let patron = self
            .store
            .find_by_username_and_email(username, email)
            .await?
            .ok_or_else(|| SyncError::PatronNotFound(username.to_string()))?;

        let otp = generate_one_time_password(self.config.otp_length);
        let patron = self.store.set_password(&patron, &otp, true).await?;
        info!(local_id = %patron.local_id, "One-time password reissued");
        Ok(self.send_one_time_password(&patron, &otp).await)
    }

    /// Create a patron in the ILS and store it locally with the chosen
    /// password.
    ///
    /// Nothing is stored when the ILS refuses the new patron.
    ///
    /// # Errors
    ///
    /// - `SyncError::PasswordMismatch` for a blank password.
    /// - `SyncError::Ils` when the driver cannot create patrons.
    /// - `SyncError::WriteBack` with the ILS status when the ILS refuses.
    /// - `StoreError::IdentityConflict` when the generated barcode is taken.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<SyncOutcome, SyncError> {
        if registration.password.is_empty() {
            return Err(SyncError::PasswordMismatch);
        }
        let email = registration.email.trim();
        let display_name = registration.display_name();
        let barcode = self.config.barcode.generate(&fallback_entropy(
            &display_name,
            email,
            Utc::now().timestamp_millis(),
        ));

        let profile = PatronProfile {
            barcode: Some(barcode.clone()),
            first_name: Some(registration.first_name.trim().to_string()),
            last_name: Some(registration.last_name.trim().to_string()),
            emails: vec![email.to_string()],
            ..PatronProfile::new("")
        };
        let external_id = match self
            .driver
            .create_patron(&profile, &registration.password)
            .await
        {
            Ok(id) => id,
            Err(e @ IlsError::Unsupported { .. }) => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "ILS refused self-registration");
                return Err(SyncError::write_back(e));
            }
        };

        let mut patch = PatronPatch::new()
            .with_external_id(&external_id)
            .with_username(&barcode)
            .with_email(email)
            .with_password(&registration.password)
            .with_catalog_secret(&registration.password)
            .with_one_time_password(false)
            .with_force_password_change(false);
        if !display_name.is_empty() {
            patch = patch.with_display_name(display_name);
        }
        let patron = self
            .store
            .create_or_update(patch, true)
            .await?
            .ok_or_else(|| SyncError::PatronNotFound(external_id.clone()))?;
        info!(local_id = %patron.local_id, external_id = %external_id, "Patron self-registered");

        Ok(SyncOutcome {
            action: SyncAction::Created,
            external_id,
            barcode: Some(barcode),
            notified: false,
        })
    }

    fn entropy(&self, event: &WebhookUser, signature: Option<&str>) -> String {
        match signature.map(str::trim).filter(|s| !s.is_empty()) {
            Some(sig) => sig.to_string(),
            None => fallback_entropy(
                &event.user.display_name().unwrap_or_default(),
                event.user.preferred_email().unwrap_or_default(),
                Utc::now().timestamp_millis(),
            ),
        }
    }

    async fn send_one_time_password(&self, patron: &Patron, otp: &str) -> bool {
        let Some(to) = patron.email.clone() else {
            warn!(local_id = %patron.local_id, "Patron has no email, one-time password not sent");
            return false;
        };
        let message = EmailMessage {
            to,
            subject: "Your library account".to_string(),
            html_body: one_time_password_body(patron, otp),
            from: self.config.email_from.clone(),
            reply_to: self.config.email_reply_to.clone(),
            bcc: self.config.email_bcc.clone(),
        };
        let sent = self.mailer.send(message).await;
        if !sent {
            warn!(local_id = %patron.local_id, "One-time password email failed");
        }
        sent
    }
}

fn one_time_password_body(patron: &Patron, otp: &str) -> String {
    let greeting = patron.display_name.as_deref().unwrap_or(&patron.username);
    format!(
        "<p>Dear {},</p>\
         <p>Your library card number is <strong>{}</strong>.</p>\
         <p>Your one-time password is <strong>{}</strong>. \
         You will be asked to choose a new password when you first sign in.</p>",
        html_escape(greeting),
        html_escape(&patron.username),
        html_escape(otp)
    )
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
