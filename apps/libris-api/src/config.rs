//! Application configuration loaded from environment variables.
//!
//! Process-level settings (database, bind address, log filter) are plain
//! variables and fail fast. Component settings are read from
//! `LIBRIS_<SECTION>__<KEY>` variables through [`EnvConfigProvider`], in one
//! snapshot taken at startup.

use libris_core::{ConfigProvider, ConfigSection, EnvConfigProvider};
use libris_db::DEFAULT_MAX_CONNECTIONS;
use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Section holding the ILS dialect, endpoint and availability vocabularies.
pub const CATALOG_SECTION: &str = "catalog";
/// Section holding the credential policy.
pub const AUTHENTICATION_SECTION: &str = "authentication";
/// Section holding the webhook gate settings.
pub const WEBHOOK_SECTION: &str = "webhook";
/// Section holding provisioning and email settings.
pub const SYNC_SECTION: &str = "sync";
/// Section holding masking rules and the new-items cache lifetime.
pub const HOLDINGS_SECTION: &str = "holdings";

/// Configuration errors that can occur during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("Failed to parse port: {0}")]
    InvalidPort(#[from] std::num::ParseIntError),

    #[error(transparent)]
    Section(#[from] libris_core::ConfigError),
}

/// Supported ILS dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IlsDialect {
    XServer,
    RestXml,
}

impl IlsDialect {
    /// Read `dialect` from the catalog section.
    pub fn from_section(section: &ConfigSection) -> Result<Self, libris_core::ConfigError> {
        match section.require("dialect")?.trim().to_lowercase().as_str() {
            "xserver" | "x-server" => Ok(Self::XServer),
            "restxml" | "rest" => Ok(Self::RestXml),
            other => Err(libris_core::ConfigError::InvalidValue {
                section: section.name().to_string(),
                key: "dialect".to_string(),
                message: format!("expected 'xserver' or 'restxml', got '{other}'"),
            }),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    /// Log filter used when `RUST_LOG` does not parse.
    pub rust_log: String,
    pub dialect: IlsDialect,
    sections: EnvConfigProvider,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Required Variables
    ///
    /// - `DATABASE_URL` - PostgreSQL connection string
    /// - `LIBRIS_CATALOG__DIALECT` - `xserver` or `restxml`
    ///
    /// # Optional Variables
    ///
    /// - `RUST_LOG` - Log level filter (default: "info")
    /// - `HOST` - Bind address (default: "0.0.0.0")
    /// - `PORT` - Listen port (default: 8080)
    /// - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (development only)
        let _ = dotenvy::dotenv();
        Self::from_vars(env::vars())
    }

    /// Load configuration from an explicit variable list.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let var = |name: &str| vars.get(name).filter(|v| !v.is_empty()).cloned();

        let database_url =
            var("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let rust_log = var("RUST_LOG").unwrap_or_else(|| "info".to_string());
        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port: u16 = var("PORT").unwrap_or_else(|| "8080".to_string()).parse()?;
        if port == 0 {
            return Err(ConfigError::InvalidValue {
                var: "PORT".to_string(),
                message: "Port must be between 1 and 65535".to_string(),
            });
        }

        let max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "DATABASE_MAX_CONNECTIONS".to_string(),
                        message: format!("expected a positive integer, got '{raw}'"),
                    })
                }
            },
        };

        let sections = EnvConfigProvider::from_vars(vars.iter().map(|(k, v)| (k, v.clone())));
        let dialect = IlsDialect::from_section(&sections.section(CATALOG_SECTION))?;

        Ok(Self {
            database_url,
            max_connections,
            host,
            port,
            rust_log,
            dialect,
            sections,
        })
    }

    /// Component configuration section.
    #[must_use]
    pub fn section(&self, name: &str) -> ConfigSection {
        self.sections.section(name)
    }

    /// Get the bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
