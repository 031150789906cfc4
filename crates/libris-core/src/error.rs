//! Authentication failure taxonomy.
//!
//! Shared by the ILS drivers (which produce `Blank`, `InvalidCredentials`
//! and `TransportFailure`) and the login flows (which add
//! `OneTimePasswordUsed`). Every variant maps to its own user-facing message
//! key; folding two of them together either leaks whether an account exists
//! or hides an outage.

use serde::Serialize;
use thiserror::Error;

/// Why an authentication attempt did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthError {
    /// Username or password was empty.
    #[error("Username and password are required")]
    Blank,

    /// The ILS or the local store gave a definitive "no".
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The one-time password was already exchanged for a permanent one.
    #[error("One-time password has already been used")]
    OneTimePasswordUsed,

    /// The ILS could not be asked. Never means "account does not exist".
    #[error("Authentication backend unavailable: {0}")]
    TransportFailure(String),
}

impl AuthError {
    /// Translation key for the message shown to the patron.
    #[must_use]
    pub fn message_key(&self) -> &'static str {
        match self {
            AuthError::Blank => "authentication_error_blank",
            AuthError::InvalidCredentials => "authentication_error_invalid",
            AuthError::OneTimePasswordUsed => "authentication_error_otp_used",
            AuthError::TransportFailure(_) => "authentication_error_technical",
        }
    }

    /// Check if this error is a definitive rejection of the credentials.
    #[must_use]
    pub fn is_definitive(&self) -> bool {
        !matches!(self, AuthError::TransportFailure(_))
    }
}
