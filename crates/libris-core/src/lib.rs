//! libris Core Library
//!
//! Shared types for the libris ILS identity and holdings integration core.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (`PatronId`)
//! - [`config`] - Sectioned configuration contract (`ConfigProvider`)
//! - [`error`] - Authentication failure taxonomy (`AuthError`)
//!
//! # Example
//!
//! ```
//! use libris_core::{ConfigProvider, PatronId, StaticConfigProvider};
//!
//! let patron = PatronId::new();
//! assert_eq!(patron.to_string().len(), 36);
//!
//! let provider = StaticConfigProvider::default().with("Catalog", "url", "https://ils.example.org");
//! let catalog = provider.section("Catalog");
//! assert_eq!(catalog.get("url"), Some("https://ils.example.org"));
//! ```

pub mod config;
pub mod error;
pub mod ids;

pub use config::{
    ConfigError, ConfigProvider, ConfigSection, EnvConfigProvider, StaticConfigProvider,
};
pub use error::AuthError;
pub use ids::{ParseIdError, PatronId};
