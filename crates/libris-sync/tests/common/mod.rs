//! Shared fixtures for synchronizer tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libris_auth::{CredentialPolicy, CredentialVault, PasswordHasher};
use libris_core::{AuthError, PatronId};
use libris_db::{CredentialStore, DbError, InMemoryPatronRepository, Patron, PatronRepository};
use libris_ils::{Holding, IlsDriver, IlsError, IlsResult, PatronProfile, ProfileUpdate};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::sync::Arc;

/// Scriptable ILS driver that records write-backs.
#[derive(Default)]
pub struct StubDriver {
    /// username -> (password, profile)
    pub accounts: Mutex<HashMap<String, (String, PatronProfile)>>,
    /// Status to reject write-backs with.
    pub reject_updates: Mutex<Option<u16>>,
    pub outage: Mutex<bool>,
    pub updates: Mutex<Vec<(String, ProfileUpdate)>>,
    pub auth_calls: Mutex<u32>,
    /// Patrons created through `create_patron`.
    pub created: Mutex<Vec<PatronProfile>>,
}

impl StubDriver {
    pub fn with_account(self, username: &str, password: &str, profile: PatronProfile) -> Self {
        self.accounts
            .lock()
            .unwrap()
            .insert(username.to_string(), (password.to_string(), profile));
        self
    }

    pub fn reject_updates_with(&self, status: u16) {
        *self.reject_updates.lock().unwrap() = Some(status);
    }

    pub fn set_outage(&self, down: bool) {
        *self.outage.lock().unwrap() = down;
    }

    pub fn updates(&self) -> Vec<(String, ProfileUpdate)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn auth_calls(&self) -> u32 {
        *self.auth_calls.lock().unwrap()
    }

    pub fn created(&self) -> Vec<PatronProfile> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl IlsDriver for StubDriver {
    fn dialect(&self) -> &'static str {
        "stub"
    }

    async fn authenticate_patron(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<PatronProfile, AuthError> {
        *self.auth_calls.lock().unwrap() += 1;
        if *self.outage.lock().unwrap() {
            return Err(AuthError::TransportFailure("connection refused".into()));
        }
        match self.accounts.lock().unwrap().get(username) {
            Some((password, profile)) if password == secret => Ok(profile.clone()),
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    async fn fetch_profile(&self, external_id: &str) -> IlsResult<PatronProfile> {
        Ok(PatronProfile::new(external_id))
    }

    async fn fetch_holdings(
        &self,
        _record_id: &str,
        _patron: Option<&PatronProfile>,
    ) -> IlsResult<Vec<Holding>> {
        Ok(Vec::new())
    }

    async fn update_profile(&self, external_id: &str, update: &ProfileUpdate) -> IlsResult<()> {
        if let Some(status) = *self.reject_updates.lock().unwrap() {
            return Err(IlsError::Rejected {
                status,
                message: "update refused".into(),
            });
        }
        self.updates
            .lock()
            .unwrap()
            .push((external_id.to_string(), update.clone()));
        if let Some(password) = &update.password {
            for (stored, profile) in self.accounts.lock().unwrap().values_mut() {
                if profile.id == external_id {
                    *stored = password.clone();
                }
            }
        }
        Ok(())
    }

    async fn find_new_items(&self, _days_old: u32) -> IlsResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn create_patron(&self, profile: &PatronProfile, secret: &str) -> IlsResult<String> {
        if let Some(status) = *self.reject_updates.lock().unwrap() {
            return Err(IlsError::Rejected {
                status,
                message: "create refused".into(),
            });
        }
        let mut created = self.created.lock().unwrap();
        let id = format!("9{:03}", created.len() + 1);
        let stored = PatronProfile {
            id: id.clone(),
            ..profile.clone()
        };
        created.push(stored.clone());
        if let Some(barcode) = &profile.barcode {
            self.accounts
                .lock()
                .unwrap()
                .insert(barcode.clone(), (secret.to_string(), stored));
        }
        Ok(id)
    }
}

fn fast_vault() -> CredentialVault {
    CredentialVault::with_hasher(
        CredentialPolicy {
            hash_passwords: true,
            ..Default::default()
        },
        PasswordHasher::with_params(4096, 1, 1).unwrap(),
    )
    .unwrap()
}

pub fn fast_store() -> (Arc<InMemoryPatronRepository>, CredentialStore) {
    let repo = Arc::new(InMemoryPatronRepository::new());
    (repo.clone(), CredentialStore::new(repo, Arc::new(fast_vault())))
}

/// Repository whose next lookups miss, as if a concurrent insert committed
/// between the reads and the write.
#[derive(Default)]
pub struct RacingRepository {
    pub inner: InMemoryPatronRepository,
    pub hidden_lookups: AtomicUsize,
}

impl RacingRepository {
    pub fn hide_next(&self, lookups: usize) {
        self.hidden_lookups.store(lookups, Ordering::SeqCst);
    }

    fn hide(&self) -> bool {
        self.hidden_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl PatronRepository for RacingRepository {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Patron>, DbError> {
        if self.hide() {
            return Ok(None);
        }
        self.inner.find_by_external_id(external_id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Patron>, DbError> {
        if self.hide() {
            return Ok(None);
        }
        self.inner.find_by_username(username).await
    }

    async fn insert(&self, patron: &Patron) -> Result<(), DbError> {
        self.inner.insert(patron).await
    }

    async fn update(&self, patron: &Patron) -> Result<(), DbError> {
        self.inner.update(patron).await
    }

    async fn delete_by_external_id(&self, external_id: &str) -> Result<bool, DbError> {
        self.inner.delete_by_external_id(external_id).await
    }

    async fn touch_last_login(&self, id: PatronId, at: DateTime<Utc>) -> Result<(), DbError> {
        self.inner.touch_last_login(id, at).await
    }
}

pub fn racing_store() -> (Arc<RacingRepository>, CredentialStore) {
    let repo = Arc::new(RacingRepository::default());
    (repo.clone(), CredentialStore::new(repo, Arc::new(fast_vault())))
}
