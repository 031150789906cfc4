//! Router fixtures.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use libris_auth::{CredentialPolicy, CredentialVault, PasswordHasher};
use libris_core::AuthError;
use libris_db::{CredentialStore, InMemoryPatronRepository};
use libris_ils::{Holding, IlsDriver, IlsError, IlsResult, PatronProfile, ProfileUpdate};
use libris_sync::{IdentitySynchronizer, MockEmailSender, SyncConfig};
use libris_webhooks::{webhooks_router, GateConfig, WebhookGate, WebhookState};
use std::sync::{Arc, Mutex};

pub const SECRET: &str = "webhook-secret";

/// Driver that accepts or rejects write-backs.
#[derive(Default)]
pub struct WriteBackDriver {
    pub reject_with: Option<u16>,
    pub updates: Mutex<Vec<ProfileUpdate>>,
}

#[async_trait]
impl IlsDriver for WriteBackDriver {
    fn dialect(&self) -> &'static str {
        "stub"
    }

    async fn authenticate_patron(&self, _: &str, _: &str) -> Result<PatronProfile, AuthError> {
        Err(AuthError::InvalidCredentials)
    }

    async fn fetch_profile(&self, external_id: &str) -> IlsResult<PatronProfile> {
        Ok(PatronProfile::new(external_id))
    }

    async fn fetch_holdings(&self, _: &str, _: Option<&PatronProfile>) -> IlsResult<Vec<Holding>> {
        Ok(Vec::new())
    }

    async fn update_profile(&self, _: &str, update: &ProfileUpdate) -> IlsResult<()> {
        if let Some(status) = self.reject_with {
            return Err(IlsError::Rejected {
                status,
                message: "refused".into(),
            });
        }
        self.updates.lock().unwrap().push(update.clone());
        Ok(())
    }

    async fn find_new_items(&self, _: u32) -> IlsResult<Vec<String>> {
        Ok(Vec::new())
    }
}

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryPatronRepository>,
    pub mailer: Arc<MockEmailSender>,
    pub driver: Arc<WriteBackDriver>,
}

pub fn app(gate: GateConfig, driver: WriteBackDriver) -> TestApp {
    let repo = Arc::new(InMemoryPatronRepository::new());
    let vault = CredentialVault::with_hasher(
        CredentialPolicy {
            hash_passwords: true,
            ..Default::default()
        },
        PasswordHasher::with_params(4096, 1, 1).unwrap(),
    )
    .unwrap();
    let store = CredentialStore::new(repo.clone(), Arc::new(vault));
    let mailer = Arc::new(MockEmailSender::new());
    let driver = Arc::new(driver);
    let synchronizer =
        IdentitySynchronizer::new(store, driver.clone(), mailer.clone(), SyncConfig::default());
    let router = webhooks_router(WebhookState::new(WebhookGate::new(gate), synchronizer));
    TestApp {
        router,
        repo,
        mailer,
        driver,
    }
}

pub fn enabled() -> GateConfig {
    GateConfig {
        enabled: true,
        secret: Some(SECRET.to_string()),
    }
}
