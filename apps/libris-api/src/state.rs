//! Service wiring.
//!
//! Every component receives its configuration here, once, as a typed
//! struct. Nothing below this module reads the environment.

use crate::config::{
    Config, IlsDialect, AUTHENTICATION_SECTION, CATALOG_SECTION, HOLDINGS_SECTION, SYNC_SECTION,
    WEBHOOK_SECTION,
};
use libris_api_auth::AuthState;
use libris_auth::{CredentialError, CredentialPolicy, CredentialVault};
use libris_core::{ConfigError, ConfigSection};
use libris_db::{CredentialStore, DbPool, PgPatronRepository};
use libris_holdings::{HoldingsAggregator, MaskingConfig};
use libris_ils::new_items::DEFAULT_TTL_SECONDS;
use libris_ils::{
    IlsDriver, IlsError, IlsTransport, NewItemsCache, RestXmlConfig, RestXmlDriver,
    TransportConfig, XServerConfig, XServerDriver,
};
use libris_sync::{IdentitySynchronizer, LogEmailSender, LoginService, SyncConfig};
use libris_webhooks::{GateConfig, WebhookGate, WebhookState};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Failures while assembling services. Always fatal.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Credential policy rejected: {0}")]
    Credential(#[from] CredentialError),

    #[error("ILS client could not be built: {0}")]
    Ils(#[from] IlsError),
}

/// State of the catalog routes (health and holdings).
#[derive(Clone)]
pub struct CatalogState {
    pub driver: Arc<dyn IlsDriver>,
    pub holdings: Arc<HoldingsAggregator>,
    pub new_items: NewItemsCache,
    pub started_at: Arc<Instant>,
}

impl CatalogState {
    pub fn new(
        driver: Arc<dyn IlsDriver>,
        holdings: HoldingsAggregator,
        new_items: NewItemsCache,
    ) -> Self {
        Self {
            driver,
            holdings: Arc::new(holdings),
            new_items,
            started_at: Arc::new(Instant::now()),
        }
    }
}

/// Everything the routers need.
pub struct Services {
    pub catalog: CatalogState,
    pub webhooks: WebhookState,
    pub auth: AuthState,
}

/// Read transport settings: `tls_verify`, `read_timeout_seconds`,
/// `connect_timeout_seconds`.
fn transport_config(section: &ConfigSection) -> Result<TransportConfig, ConfigError> {
    let defaults = TransportConfig::default();
    Ok(TransportConfig {
        read_timeout: Duration::from_secs(
            section.get_parsed("read_timeout_seconds", defaults.read_timeout.as_secs())?,
        ),
        connect_timeout: Duration::from_secs(
            section.get_parsed("connect_timeout_seconds", defaults.connect_timeout.as_secs())?,
        ),
        tls_verify: section.get_bool("tls_verify", defaults.tls_verify)?,
    })
}

/// Build the configured ILS driver.
pub fn build_driver(
    dialect: IlsDialect,
    section: &ConfigSection,
) -> Result<Arc<dyn IlsDriver>, StartupError> {
    let transport = IlsTransport::new(&transport_config(section)?)?;
    let driver: Arc<dyn IlsDriver> = match dialect {
        IlsDialect::XServer => Arc::new(XServerDriver::new(
            XServerConfig::from_section(section)?,
            transport,
        )),
        IlsDialect::RestXml => Arc::new(RestXmlDriver::new(
            RestXmlConfig::from_section(section)?,
            transport,
        )),
    };
    tracing::info!(dialect = driver.dialect(), "ILS driver configured");
    Ok(driver)
}

/// Assemble all services on top of a connected pool.
pub fn build_services(config: &Config, pool: DbPool) -> Result<Services, StartupError> {
    let driver = build_driver(config.dialect, &config.section(CATALOG_SECTION))?;

    let policy = CredentialPolicy::from_section(&config.section(AUTHENTICATION_SECTION))?;
    let vault = CredentialVault::new(policy)?;
    let store = CredentialStore::new(Arc::new(PgPatronRepository::new(pool)), Arc::new(vault));

    let sync_config = SyncConfig::from_section(&config.section(SYNC_SECTION))?;
    let trust_window = sync_config.login_trust_window;
    let synchronizer = IdentitySynchronizer::new(
        store.clone(),
        Arc::clone(&driver),
        Arc::new(LogEmailSender),
        sync_config,
    );
    let login = LoginService::new(store, Arc::clone(&driver), trust_window);

    let gate_config = GateConfig::from_section(&config.section(WEBHOOK_SECTION))?;
    if gate_config.enabled && gate_config.secret.is_none() {
        tracing::warn!("Webhooks enabled without a secret; every delivery will be refused");
    }

    let holdings_section = config.section(HOLDINGS_SECTION);
    let masking = MaskingConfig::from_section(&holdings_section)?;
    let ttl = holdings_section.get_parsed("new_items_ttl_seconds", DEFAULT_TTL_SECONDS)?;

    Ok(Services {
        catalog: CatalogState::new(
            Arc::clone(&driver),
            HoldingsAggregator::new(Arc::clone(&driver), masking),
            NewItemsCache::new(Duration::from_secs(ttl)),
        ),
        webhooks: WebhookState::new(WebhookGate::new(gate_config), synchronizer.clone()),
        auth: AuthState::new(login, synchronizer),
    })
}
