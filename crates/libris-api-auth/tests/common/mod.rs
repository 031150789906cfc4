//! Router fixtures for the authentication endpoints.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::Router;
use chrono::NaiveDate;
use libris_api_auth::{auth_router, AuthState};
use libris_auth::{CredentialPolicy, CredentialVault, PasswordHasher};
use libris_core::AuthError;
use libris_db::{CredentialStore, InMemoryPatronRepository, PatronPatch};
use libris_ils::{Holding, IlsDriver, IlsError, IlsResult, PatronProfile, ProfileUpdate};
use libris_sync::{IdentitySynchronizer, LoginService, MockEmailSender, SyncConfig};
use std::sync::{Arc, Mutex};

/// ILS with a single patron `B6100` / `secret`.
pub struct OneAccountDriver {
    pub password: Mutex<String>,
    pub down: bool,
    /// The dialect cannot create patrons.
    pub read_only: bool,
    pub created: Mutex<Vec<PatronProfile>>,
}

impl Default for OneAccountDriver {
    fn default() -> Self {
        Self {
            password: Mutex::new("secret".into()),
            down: false,
            read_only: false,
            created: Mutex::new(Vec::new()),
        }
    }
}

pub fn profile() -> PatronProfile {
    PatronProfile {
        barcode: Some("B6100".into()),
        first_name: Some("Jane".into()),
        last_name: Some("Doe".into()),
        emails: vec!["jane@example.org".into()],
        group: Some("STAFF".into()),
        expiry_date: NaiveDate::from_ymd_opt(2099, 12, 31),
        blocks: vec!["Overdue items".into()],
        ..PatronProfile::new("6100")
    }
}

#[async_trait]
impl IlsDriver for OneAccountDriver {
    fn dialect(&self) -> &'static str {
        "stub"
    }

    async fn authenticate_patron(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<PatronProfile, AuthError> {
        if self.down {
            return Err(AuthError::TransportFailure("timeout".into()));
        }
        if username == "B6100" && *self.password.lock().unwrap() == secret {
            Ok(profile())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    async fn fetch_profile(&self, _: &str) -> IlsResult<PatronProfile> {
        Ok(profile())
    }

    async fn fetch_holdings(&self, _: &str, _: Option<&PatronProfile>) -> IlsResult<Vec<Holding>> {
        Ok(Vec::new())
    }

    async fn update_profile(&self, _: &str, update: &ProfileUpdate) -> IlsResult<()> {
        if let Some(password) = &update.password {
            *self.password.lock().unwrap() = password.clone();
        }
        Ok(())
    }

    async fn find_new_items(&self, _: u32) -> IlsResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn create_patron(&self, profile: &PatronProfile, _: &str) -> IlsResult<String> {
        if self.read_only {
            return Err(IlsError::Unsupported {
                dialect: "stub",
                operation: "create_patron",
            });
        }
        if self.down {
            return Err(IlsError::server_error(503, "maintenance"));
        }
        let mut created = self.created.lock().unwrap();
        created.push(profile.clone());
        Ok(format!("9{:03}", created.len()))
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: CredentialStore,
    pub mailer: Arc<MockEmailSender>,
    pub driver: Arc<OneAccountDriver>,
}

pub fn app(driver: OneAccountDriver) -> TestApp {
    let vault = CredentialVault::with_hasher(
        CredentialPolicy {
            hash_passwords: true,
            ..Default::default()
        },
        PasswordHasher::with_params(4096, 1, 1).unwrap(),
    )
    .unwrap();
    let store = CredentialStore::new(Arc::new(InMemoryPatronRepository::new()), Arc::new(vault));
    let stub = Arc::new(driver);
    let driver: Arc<dyn IlsDriver> = stub.clone();
    let mailer = Arc::new(MockEmailSender::new());
    let synchronizer = IdentitySynchronizer::new(
        store.clone(),
        driver.clone(),
        mailer.clone(),
        SyncConfig::default(),
    );
    let login = LoginService::new(store.clone(), driver, None);
    TestApp {
        router: auth_router(AuthState::new(login, synchronizer)),
        store,
        mailer,
        driver: stub,
    }
}

/// Store a provisioned patron holding `otp`.
pub async fn provision_with_otp(store: &CredentialStore, otp: &str) {
    store
        .create_or_update(
            PatronPatch::new()
                .with_external_id("6100")
                .with_username("B6100")
                .with_email("jane@example.org")
                .with_password(otp)
                .with_one_time_password(true),
            true,
        )
        .await
        .unwrap();
}

pub fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn form_post(uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(serde_urlencoded::to_string(fields).unwrap()))
        .unwrap()
}

pub async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}
