//! Login reconciliation.
//!
//! Decides whether an interactive login can be answered locally or needs the
//! ILS, and folds what the ILS returns back into the credential store.
//!
//! Order of checks:
//! 1. blank username or password is rejected outright;
//! 2. a patron holding a one-time password that matches is told to change
//!    it, and no session is established;
//! 3. local-only patrons are verified locally;
//! 4. inside the trust window a locally verified password is accepted;
//! 5. otherwise the ILS decides and the local row is created or refreshed.

use crate::error::SyncError;
use chrono::{Duration, Utc};
use libris_core::AuthError;
use libris_db::{CredentialStore, Patron, PatronPatch, StoreError};
use libris_ils::{IlsDriver, PatronProfile, ProfileUpdate};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of a login attempt that passed credential checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Session may be established. `profile` is set when the ILS was asked.
    Authenticated {
        patron: Patron,
        profile: Option<PatronProfile>,
    },
    /// The one-time password was correct; a new password must be set first.
    PasswordChangeRequired { patron: Patron },
}

impl LoginOutcome {
    #[must_use]
    pub fn patron(&self) -> &Patron {
        match self {
            LoginOutcome::Authenticated { patron, .. }
            | LoginOutcome::PasswordChangeRequired { patron } => patron,
        }
    }

    #[must_use]
    pub fn force_password_change(&self) -> bool {
        matches!(self, LoginOutcome::PasswordChangeRequired { .. })
    }
}

/// Login and password-set flows.
#[derive(Clone)]
pub struct LoginService {
    store: CredentialStore,
    driver: Arc<dyn IlsDriver>,
    trust_window: Option<Duration>,
}

impl std::fmt::Debug for LoginService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginService")
            .field("driver", &self.driver.dialect())
            .field("trust_window", &self.trust_window)
            .finish_non_exhaustive()
    }
}

fn store_failure(err: StoreError) -> AuthError {
    if err.is_conflict() {
        // The ILS account cannot be linked without taking over another patron.
        warn!(error = %err, "Login refused on identity conflict");
        return AuthError::InvalidCredentials;
    }
    warn!(error = %err, "Credential store unavailable during login");
    AuthError::TransportFailure(err.to_string())
}

impl LoginService {
    pub fn new(
        store: CredentialStore,
        driver: Arc<dyn IlsDriver>,
        trust_window: Option<Duration>,
    ) -> Self {
        Self {
            store,
            driver,
            trust_window,
        }
    }

    /// Interactive login.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::Blank);
        }

        if let Some(patron) = self.store.find_by_username(username).await.map_err(store_failure)? {
            let verified = self
                .store
                .verify_password(&patron, password)
                .map_err(store_failure)?;

            if patron.credential.is_one_time_password && verified {
                let patron = self
                    .store
                    .mark_force_password_change(&patron)
                    .await
                    .map_err(store_failure)?;
                info!(local_id = %patron.local_id, "One-time password accepted, password change required");
                return Ok(LoginOutcome::PasswordChangeRequired { patron });
            }

            if patron.is_local_only() {
                return if verified {
                    self.finish_local(patron).await
                } else {
                    Err(AuthError::InvalidCredentials)
                };
            }

            if verified && self.within_trust_window(&patron) {
                debug!(local_id = %patron.local_id, "Login verified locally inside trust window");
                return self.finish_local(patron).await;
            }
        }

        self.authenticate_with_ils(username, password).await
    }

    /// Ask the ILS and reconcile the local row with the returned profile.
    ///
    /// A patron the ILS accepts is created locally when missing; its
    /// password and catalog secret are refreshed and any pending one-time
    /// password is dropped.
    #[instrument(skip(self, password))]
    pub async fn authenticate_with_ils(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::Blank);
        }

        let profile = self.driver.authenticate_patron(username, password).await?;

        let mut patch = PatronPatch::new()
            .with_external_id(&profile.id)
            .with_username(username)
            .with_password(password)
            .with_catalog_secret(password)
            .with_one_time_password(false)
            .with_force_password_change(false);
        let name = profile.display_name();
        if !name.is_empty() {
            patch = patch.with_display_name(name);
        }
        if let Some(email) = profile.primary_email() {
            patch = patch.with_email(email);
        }
        if let Some(opt_in) = profile.loan_history_opt_in {
            patch = patch.with_loan_history_opt_in(opt_in);
        }

        let patron = self
            .store
            .create_or_update(patch, true)
            .await
            .map_err(store_failure)?
            .ok_or(AuthError::InvalidCredentials)?;
        self.store
            .record_login(patron.local_id)
            .await
            .map_err(store_failure)?;
        info!(local_id = %patron.local_id, external_id = %profile.id, "Login verified by ILS");

        Ok(LoginOutcome::Authenticated {
            patron,
            profile: Some(profile),
        })
    }

    /// Exchange a one-time password for a permanent one.
    ///
    /// The new password is pushed to the ILS first; a rejection leaves the
    /// local credential untouched.
    ///
    /// # Errors
    ///
    /// - `SyncError::PasswordMismatch` for blank or non-matching input.
    /// - `AuthError::OneTimePasswordUsed` when the patron has no pending
    ///   one-time password.
    /// - `AuthError::InvalidCredentials` for an unknown patron or wrong OTP.
    /// - `SyncError::WriteBack` with the ILS status when the ILS refuses.
    #[instrument(skip(self, otp, new_password, confirmation))]
    pub async fn set_password_via_otp(
        &self,
        username: &str,
        otp: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<Patron, SyncError> {
        if username.trim().is_empty() || otp.is_empty() {
            return Err(AuthError::Blank.into());
        }
        if new_password.is_empty() || new_password != confirmation {
            return Err(SyncError::PasswordMismatch);
        }

        let patron = self
            .store
            .find_by_username(username.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if !patron.credential.is_one_time_password {
            return Err(AuthError::OneTimePasswordUsed.into());
        }
        if !self.store.verify_password(&patron, otp)? {
            return Err(AuthError::InvalidCredentials.into());
        }

        if let Some(external_id) = &patron.external_id {
            self.driver
                .update_profile(external_id, &ProfileUpdate::default().with_password(new_password))
                .await
                .map_err(SyncError::write_back)?;
        }

        let patron = self.store.set_password(&patron, new_password, false).await?;
        let patron = if patron.is_local_only() {
            patron
        } else {
            self.store
                .create_or_update(
                    PatronPatch::new()
                        .with_username(&patron.username)
                        .with_catalog_secret(new_password),
                    false,
                )
                .await?
                .unwrap_or(patron)
        };
        info!(local_id = %patron.local_id, "Permanent password set");
        Ok(patron)
    }

    fn within_trust_window(&self, patron: &Patron) -> bool {
        match (self.trust_window, patron.last_login_at) {
            (Some(window), Some(last)) => Utc::now() - last <= window,
            _ => false,
        }
    }

    async fn finish_local(&self, patron: Patron) -> Result<LoginOutcome, AuthError> {
        self.store
            .record_login(patron.local_id)
            .await
            .map_err(store_failure)?;
        Ok(LoginOutcome::Authenticated {
            patron,
            profile: None,
        })
    }
}
