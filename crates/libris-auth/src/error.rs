//! Credential error types.

use thiserror::Error;

/// Errors raised while sealing or checking credentials.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// Password hashing failed.
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    /// Stored hash is not a valid PHC string.
    #[error("Invalid password hash format")]
    InvalidHashFormat,

    /// Catalog secret could not be encrypted or decrypted.
    #[error("Catalog secret encryption failed: {0}")]
    EncryptionFailed(String),

    /// Credential policy is unusable. Fatal at startup.
    #[error("Credential configuration error: {0}")]
    Configuration(String),
}

impl CredentialError {
    /// Check if this error comes from the configuration rather than the data.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, CredentialError::Configuration(_))
    }
}
