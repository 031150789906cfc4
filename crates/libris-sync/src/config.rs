//! Synchronizer configuration.

use chrono::Duration;
use libris_auth::{BarcodeGenerator, DEFAULT_BARCODE_LENGTH, DEFAULT_OTP_LENGTH};
use libris_core::{ConfigError, ConfigSection};

/// Shortest one-time password accepted from configuration.
pub const MIN_OTP_LENGTH: usize = 6;
/// Longest generated barcode hash or one-time password.
const MAX_GENERATED_LENGTH: usize = 64;

/// Settings for provisioning, notifications and login reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub barcode: BarcodeGenerator,
    pub otp_length: usize,
    pub email_from: String,
    pub email_reply_to: String,
    pub email_bcc: Option<String>,
    /// Local verification is trusted for this long after the last ILS-backed
    /// login. `None` always asks the ILS.
    pub login_trust_window: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            barcode: BarcodeGenerator::default(),
            otp_length: DEFAULT_OTP_LENGTH,
            email_from: "library@localhost".to_string(),
            email_reply_to: "library@localhost".to_string(),
            email_bcc: None,
            login_trust_window: None,
        }
    }
}

impl SyncConfig {
    /// Read from a section.
    ///
    /// Keys: `barcode_prefix`, `barcode_length`, `otp_length`, `email_from`,
    /// `email_reply_to` (defaults to `email_from`), `email_bcc`,
    /// `login_trust_window_minutes` (0 disables).
    pub fn from_section(section: &ConfigSection) -> Result<Self, ConfigError> {
        let barcode_length =
            bounded_length(section, "barcode_length", DEFAULT_BARCODE_LENGTH, 1)?;
        let otp_length = bounded_length(section, "otp_length", DEFAULT_OTP_LENGTH, MIN_OTP_LENGTH)?;
        let email_from = section.require("email_from")?.to_string();
        let trust_minutes: i64 = section.get_parsed("login_trust_window_minutes", 0)?;
        let login_trust_window = if trust_minutes > 0 {
            Some(
                Duration::try_minutes(trust_minutes).ok_or_else(|| ConfigError::InvalidValue {
                    section: section.name().to_string(),
                    key: "login_trust_window_minutes".to_string(),
                    message: "is out of range".to_string(),
                })?,
            )
        } else {
            None
        };

        Ok(Self {
            barcode: BarcodeGenerator::new(
                section.get("barcode_prefix").map(String::from),
                barcode_length,
            ),
            otp_length,
            email_reply_to: section.get_or("email_reply_to", &email_from).to_string(),
            email_from,
            email_bcc: section.get("email_bcc").map(String::from),
            login_trust_window,
        })
    }
}

fn bounded_length(
    section: &ConfigSection,
    key: &str,
    default: usize,
    min: usize,
) -> Result<usize, ConfigError> {
    let value: usize = section.get_parsed(key, default)?;
    if (min..=MAX_GENERATED_LENGTH).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            section: section.name().to_string(),
            key: key.to_string(),
            message: format!("must be between {min} and {MAX_GENERATED_LENGTH}"),
        })
    }
}
