//! Sectioned configuration contract.
//!
//! Configuration is read once per process into [`ConfigSection`] maps and
//! then handed to constructors as typed structs. Nothing in the workspace
//! loads configuration lazily from a getter.
//!
//! Two providers are available:
//! - [`EnvConfigProvider`] snapshots `LIBRIS_<SECTION>__<KEY>` variables.
//! - [`StaticConfigProvider`] is built in code (tests, embedding).

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use thiserror::Error;

/// Prefix of environment variables picked up by [`EnvConfigProvider`].
pub const ENV_PREFIX: &str = "LIBRIS_";

/// Separator between section and key in environment variable names.
pub const ENV_SECTION_SEPARATOR: &str = "__";

/// Configuration errors. Always fatal at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration [{section}] {key}")]
    MissingKey { section: String, key: String },

    #[error("Invalid value for [{section}] {key}: {message}")]
    InvalidValue {
        section: String,
        key: String,
        message: String,
    },
}

/// Key/value map for one configuration section.
///
/// Keys are case-insensitive (stored lowercased).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSection {
    name: String,
    values: BTreeMap<String, String>,
}

impl ConfigSection {
    /// Create an empty section.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    /// Section name as requested by the caller.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.values
            .insert(key.as_ref().to_lowercase(), value.into());
    }

    /// Raw value lookup. Empty strings count as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_lowercase())
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Value lookup with a default.
    #[must_use]
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Required value.
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::MissingKey {
            section: self.name.clone(),
            key: key.to_string(),
        })
    }

    /// Boolean value: `true/1/yes/on` and `false/0/no/off`.
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                other => Err(self.invalid(key, format!("expected a boolean, got '{other}'"))),
            },
        }
    }

    /// Parsed value with a default.
    pub fn get_parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e: T::Err| self.invalid(key, e.to_string())),
        }
    }

    /// Comma-separated list; blank entries are dropped.
    #[must_use]
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn invalid(&self, key: &str, message: String) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.name.clone(),
            key: key.to_string(),
            message,
        }
    }
}

/// Read access to configuration sections.
pub trait ConfigProvider: Send + Sync {
    /// Return the named section. Unknown sections are empty.
    fn section(&self, name: &str) -> ConfigSection;
}

/// Provider backed by a one-time snapshot of the process environment.
///
/// `LIBRIS_CATALOG__URL=https://...` becomes key `url` in section `Catalog`
/// (section lookup is case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    sections: HashMap<String, BTreeMap<String, String>>,
}

impl EnvConfigProvider {
    /// Snapshot the current environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build from an explicit list of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut sections: HashMap<String, BTreeMap<String, String>> = HashMap::new();
        for (name, value) in vars {
            let Some(rest) = name.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let Some((section, key)) = rest.split_once(ENV_SECTION_SEPARATOR) else {
                continue;
            };
            if section.is_empty() || key.is_empty() {
                continue;
            }
            sections
                .entry(section.to_uppercase())
                .or_default()
                .insert(key.to_lowercase(), value.into());
        }
        tracing::debug!(sections = sections.len(), "Configuration snapshot loaded");
        Self { sections }
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn section(&self, name: &str) -> ConfigSection {
        let mut section = ConfigSection::new(name);
        if let Some(values) = self.sections.get(&name.to_uppercase()) {
            for (k, v) in values {
                section.insert(k, v.clone());
            }
        }
        section
    }
}

/// In-code provider.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    sections: HashMap<String, ConfigSection>,
}

impl StaticConfigProvider {
    /// Add a value, creating the section on first use.
    #[must_use]
    pub fn with(mut self, section: &str, key: &str, value: impl Into<String>) -> Self {
        self.sections
            .entry(section.to_uppercase())
            .or_insert_with(|| ConfigSection::new(section))
            .insert(key, value);
        self
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn section(&self, name: &str) -> ConfigSection {
        self.sections
            .get(&name.to_uppercase())
            .cloned()
            .unwrap_or_else(|| ConfigSection::new(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_provider_splits_section_and_key() {
        let provider = EnvConfigProvider::from_vars(vec![
            ("LIBRIS_CATALOG__URL", "https://ils.example.org"),
            ("LIBRIS_CATALOG__API_KEY", "k-123"),
            ("LIBRIS_WEBHOOK__ENABLED", "true"),
            ("PATH", "/usr/bin"),
            ("LIBRIS_BROKEN", "ignored"),
        ]);

        let catalog = provider.section("Catalog");
        assert_eq!(catalog.get("url"), Some("https://ils.example.org"));
        assert_eq!(catalog.get("API_KEY"), Some("k-123"));
        assert_eq!(provider.section("webhook").get_bool("enabled", false), Ok(true));
        assert!(provider.section("Missing").get("anything").is_none());
    }

    #[test]
    fn test_require_reports_section_and_key() {
        let section = ConfigSection::new("Authentication");
        let err = section.require("hash_passwords").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required configuration [Authentication] hash_passwords"
        );
    }

    #[test]
    fn test_blank_values_are_absent() {
        let mut section = ConfigSection::new("Catalog");
        section.insert("url", "   ");
        assert!(section.get("url").is_none());
        assert_eq!(section.get_or("url", "fallback"), "fallback");
    }

    #[test]
    fn test_get_bool_rejects_garbage() {
        let mut section = ConfigSection::new("Webhook");
        section.insert("enabled", "maybe");
        assert!(matches!(
            section.get_bool("enabled", true),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_get_parsed_and_list() {
        let provider = StaticConfigProvider::default()
            .with("Holdings", "timeout", "45")
            .with("Holdings", "available_statuses", "On Shelf, ,Available ");
        let section = provider.section("holdings");
        assert_eq!(section.get_parsed::<u64>("timeout", 30), Ok(45));
        assert_eq!(section.get_parsed::<u64>("missing", 30), Ok(30));
        assert_eq!(
            section.get_list("available_statuses"),
            vec!["On Shelf".to_string(), "Available".to_string()]
        );
    }
}
