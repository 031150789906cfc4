//! Credential store.
//!
//! [`CredentialStore`] is the only writer of patron rows. Every mutation goes
//! through [`CredentialStore::create_or_update`] (or the narrower password
//! helpers built on the same path) so the credential policy is applied in
//! exactly one place.

use crate::error::DbError;
use crate::models::{Credential, Patron};
use crate::repository::PatronRepository;
use chrono::Utc;
use libris_auth::{CredentialError, CredentialVault, StoredPassword, StoredSecret};
use libris_core::PatronId;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors from the credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// The patch cannot create a patron.
    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    /// The username belongs to a patron linked to another ILS account.
    #[error("Username '{username}' is linked to external id '{existing}', not '{requested}'")]
    IdentityConflict {
        username: String,
        existing: String,
        requested: String,
    },
}

impl StoreError {
    /// Check if this error is a configuration problem rather than bad data.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, StoreError::Credential(e) if e.is_configuration())
    }

    /// Check if this error is an identity conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::IdentityConflict { .. })
    }
}

/// What [`CredentialStore::upsert`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upserted {
    /// A new row was inserted with the full patch.
    Created(Patron),
    /// An existing row was updated. When a concurrent insert won the race,
    /// only contact fields of the patch were applied.
    Updated(Patron),
}

impl Upserted {
    #[must_use]
    pub fn patron(&self) -> &Patron {
        match self {
            Upserted::Created(p) | Upserted::Updated(p) => p,
        }
    }

    #[must_use]
    pub fn into_patron(self) -> Patron {
        match self {
            Upserted::Created(p) | Upserted::Updated(p) => p,
        }
    }

    #[must_use]
    pub fn was_created(&self) -> bool {
        matches!(self, Upserted::Created(_))
    }
}

/// Partial patron update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatronPatch {
    pub external_id: Option<String>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    /// Plaintext password, sealed by the store.
    pub password: Option<String>,
    /// Plaintext ILS secret, sealed by the store.
    pub catalog_secret: Option<String>,
    pub is_one_time_password: Option<bool>,
    pub force_password_change: Option<bool>,
    pub loan_history_opt_in: Option<bool>,
}

impl PatronPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_catalog_secret(mut self, secret: impl Into<String>) -> Self {
        self.catalog_secret = Some(secret.into());
        self
    }

    #[must_use]
    pub fn with_one_time_password(mut self, value: bool) -> Self {
        self.is_one_time_password = Some(value);
        self
    }

    #[must_use]
    pub fn with_force_password_change(mut self, value: bool) -> Self {
        self.force_password_change = Some(value);
        self
    }

    #[must_use]
    pub fn with_loan_history_opt_in(mut self, value: bool) -> Self {
        self.loan_history_opt_in = Some(value);
        self
    }

    /// External id and contact fields only. Username, credentials and
    /// flags are dropped.
    #[must_use]
    pub fn contact_only(&self) -> Self {
        Self {
            external_id: self.external_id.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            ..Self::default()
        }
    }
}

/// Patron credential store over a [`PatronRepository`].
#[derive(Clone)]
pub struct CredentialStore {
    repo: Arc<dyn PatronRepository>,
    vault: Arc<CredentialVault>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("policy", self.vault.policy())
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    #[must_use]
    pub fn new(repo: Arc<dyn PatronRepository>, vault: Arc<CredentialVault>) -> Self {
        Self { repo, vault }
    }

    #[must_use]
    pub fn vault(&self) -> &CredentialVault {
        &self.vault
    }

    pub async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Patron>, StoreError> {
        Ok(self.repo.find_by_external_id(external_id).await?)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<Patron>, StoreError> {
        Ok(self.repo.find_by_username(username).await?)
    }

    /// Find a patron whose username matches exactly and whose email matches
    /// case-insensitively.
    pub async fn find_by_username_and_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<Patron>, StoreError> {
        Ok(self
            .repo
            .find_by_username(username)
            .await?
            .filter(|p| p.email_matches(email)))
    }

    /// Apply a patch to the patron it identifies, creating one if allowed.
    ///
    /// Same as [`CredentialStore::upsert`] without the created/updated
    /// distinction.
    pub async fn create_or_update(
        &self,
        patch: PatronPatch,
        create_if_missing: bool,
    ) -> Result<Option<Patron>, StoreError> {
        Ok(self
            .upsert(patch, create_if_missing)
            .await?
            .map(Upserted::into_patron))
    }

    /// Apply a patch to the patron it identifies, creating one if allowed.
    ///
    /// The patron is located by external id, falling back to username. A
    /// username match already linked to a different external id is never
    /// taken over. Returns `Ok(None)` when nothing matched and
    /// `create_if_missing` is false. Applying the same patch twice leaves
    /// the row unchanged.
    ///
    /// When the insert loses a race with a concurrent create, the winner's
    /// row receives the contact fields only and the result is
    /// [`Upserted::Updated`].
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidPatch` when a new patron lacks a username or
    ///   password.
    /// - `StoreError::IdentityConflict` when the username belongs to a
    ///   patron linked to another ILS account.
    #[instrument(skip(self, patch), fields(external_id = ?patch.external_id, username = ?patch.username))]
    pub async fn upsert(
        &self,
        patch: PatronPatch,
        create_if_missing: bool,
    ) -> Result<Option<Upserted>, StoreError> {
        if let Some(existing) = self.locate(&patch).await? {
            return self
                .update_existing(existing, &patch)
                .await
                .map(|p| Some(Upserted::Updated(p)));
        }
        if !create_if_missing {
            debug!("No matching patron and creation not requested");
            return Ok(None);
        }

        let candidate = self.build_new(&patch)?;
        match self.repo.insert(&candidate).await {
            Ok(()) => {
                info!(local_id = %candidate.local_id, "Patron created");
                Ok(Some(Upserted::Created(candidate)))
            }
            Err(e) if e.is_unique_violation() => {
                warn!(constraint = %e, "Concurrent patron insert, applying contact fields to existing row");
                let existing = self.locate(&patch).await?.ok_or(e)?;
                self.update_existing(existing, &patch.contact_only())
                    .await
                    .map(|p| Some(Upserted::Updated(p)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a patron by external id. Returns whether a row existed.
    pub async fn delete_by_external_id(&self, external_id: &str) -> Result<bool, StoreError> {
        let removed = self.repo.delete_by_external_id(external_id).await?;
        if removed {
            info!(external_id, "Patron deleted");
        }
        Ok(removed)
    }

    /// Check a candidate password against the stored credential.
    pub fn verify_password(&self, patron: &Patron, candidate: &str) -> Result<bool, StoreError> {
        Ok(self
            .vault
            .verify_password(&patron.credential.password, candidate)?)
    }

    /// Replace the password.
    ///
    /// A one-time password sets `is_one_time_password`; a permanent one
    /// clears both the one-time and the forced-change flags.
    pub async fn set_password(
        &self,
        patron: &Patron,
        password: &str,
        one_time: bool,
    ) -> Result<Patron, StoreError> {
        let mut updated = patron.clone();
        updated.credential.password = self.vault.seal_password(password)?;
        updated.credential.is_one_time_password = one_time;
        if !one_time {
            updated.force_password_change = false;
        }
        self.repo.update(&updated).await?;
        debug!(local_id = %updated.local_id, one_time, "Password replaced");
        Ok(updated)
    }

    /// Persist the forced-change flag.
    pub async fn mark_force_password_change(&self, patron: &Patron) -> Result<Patron, StoreError> {
        if patron.force_password_change {
            return Ok(patron.clone());
        }
        let mut updated = patron.clone();
        updated.force_password_change = true;
        self.repo.update(&updated).await?;
        Ok(updated)
    }

    /// Recover the plaintext ILS secret, if one is stored.
    pub fn open_catalog_secret(&self, patron: &Patron) -> Result<Option<String>, StoreError> {
        patron
            .credential
            .catalog_secret
            .as_ref()
            .map(|s| self.vault.open_catalog_secret(s))
            .transpose()
            .map_err(StoreError::from)
    }

    /// Stamp a successful login.
    pub async fn record_login(&self, id: PatronId) -> Result<(), StoreError> {
        Ok(self.repo.touch_last_login(id, Utc::now()).await?)
    }

    async fn locate(&self, patch: &PatronPatch) -> Result<Option<Patron>, StoreError> {
        if let Some(external_id) = &patch.external_id {
            if let Some(found) = self.repo.find_by_external_id(external_id).await? {
                return Ok(Some(found));
            }
        }
        let Some(username) = &patch.username else {
            return Ok(None);
        };
        let Some(found) = self.repo.find_by_username(username).await? else {
            return Ok(None);
        };
        match (&found.external_id, &patch.external_id) {
            (Some(existing), Some(requested)) if existing != requested => {
                warn!(
                    local_id = %found.local_id,
                    existing = %existing,
                    requested = %requested,
                    "Username already linked to another ILS account"
                );
                Err(StoreError::IdentityConflict {
                    username: username.clone(),
                    existing: existing.clone(),
                    requested: requested.clone(),
                })
            }
            _ => Ok(Some(found)),
        }
    }

    async fn update_existing(
        &self,
        existing: Patron,
        patch: &PatronPatch,
    ) -> Result<Patron, StoreError> {
        let updated = self.apply(existing.clone(), patch)?;
        if updated != existing {
            self.repo.update(&updated).await?;
            debug!(local_id = %updated.local_id, "Patron updated");
        }
        Ok(updated)
    }

    fn build_new(&self, patch: &PatronPatch) -> Result<Patron, StoreError> {
        let username = patch
            .username
            .clone()
            .or_else(|| patch.external_id.clone())
            .ok_or_else(|| StoreError::InvalidPatch("a new patron needs a username".into()))?;
        let password = patch
            .password
            .as_deref()
            .ok_or_else(|| StoreError::InvalidPatch("a new patron needs a password".into()))?;

        Ok(Patron {
            local_id: PatronId::new(),
            external_id: patch.external_id.clone(),
            username,
            display_name: patch.display_name.clone(),
            email: patch.email.clone(),
            credential: Credential {
                password: self.vault.seal_password(password)?,
                catalog_secret: patch
                    .catalog_secret
                    .as_deref()
                    .map(|s| self.vault.seal_catalog_secret(s))
                    .transpose()?,
                is_one_time_password: patch.is_one_time_password.unwrap_or(false),
            },
            force_password_change: patch.force_password_change.unwrap_or(false),
            loan_history_opt_in: patch.loan_history_opt_in.unwrap_or(false),
            created_at: Utc::now(),
            last_login_at: None,
        })
    }

    fn apply(&self, mut patron: Patron, patch: &PatronPatch) -> Result<Patron, StoreError> {
        if patron.external_id.is_none() {
            patron.external_id.clone_from(&patch.external_id);
        }
        if let Some(username) = &patch.username {
            patron.username.clone_from(username);
        }
        if patch.display_name.is_some() {
            patron.display_name.clone_from(&patch.display_name);
        }
        if patch.email.is_some() {
            patron.email.clone_from(&patch.email);
        }
        if let Some(password) = &patch.password {
            if !self.password_current(&patron.credential.password, password)? {
                patron.credential.password = self.vault.seal_password(password)?;
            }
        }
        if let Some(secret) = &patch.catalog_secret {
            if !self.secret_current(patron.credential.catalog_secret.as_ref(), secret)? {
                patron.credential.catalog_secret = Some(self.vault.seal_catalog_secret(secret)?);
            }
        }
        if let Some(value) = patch.is_one_time_password {
            patron.credential.is_one_time_password = value;
        }
        if let Some(value) = patch.force_password_change {
            patron.force_password_change = value;
        }
        if let Some(value) = patch.loan_history_opt_in {
            patron.loan_history_opt_in = value;
        }
        Ok(patron)
    }

    /// The stored password already represents `candidate` under the
    /// current policy.
    fn password_current(&self, stored: &StoredPassword, candidate: &str) -> Result<bool, StoreError> {
        if self.vault.needs_reseal(stored) {
            return Ok(false);
        }
        Ok(self.vault.verify_password(stored, candidate)?)
    }

    fn secret_current(&self, stored: Option<&StoredSecret>, candidate: &str) -> Result<bool, StoreError> {
        let Some(stored) = stored else {
            return Ok(false);
        };
        let policy = self.vault.policy();
        let want_encrypted = policy.encrypt_catalog_secrets && policy.encryption_key.is_some();
        if matches!(stored, StoredSecret::Encrypted(_)) != want_encrypted {
            return Ok(false);
        }
        Ok(self.vault.open_catalog_secret(stored)? == candidate)
    }
}
