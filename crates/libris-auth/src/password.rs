//! Password hashing with Argon2id.
//!
//! Provides password hashing and verification using Argon2id with
//! OWASP-recommended parameters.

use crate::error::CredentialError;
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

/// Password hasher configuration.
///
/// Uses OWASP 2024 recommended parameters for Argon2id:
/// - Memory: 19456 KiB (19 MiB)
/// - Iterations: 2
/// - Parallelism: 1
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher {
    /// Create a new password hasher with OWASP-recommended parameters.
    #[must_use]
    pub fn new() -> Self {
        // argon2's defaults are m=19456, t=2, p=1.
        Self {
            params: Params::DEFAULT,
        }
    }

    /// Create a password hasher with custom parameters.
    ///
    /// # Errors
    ///
    /// Returns error if parameters are invalid.
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, CredentialError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| CredentialError::HashingFailed(format!("Invalid parameters: {e}")))?;

        Ok(Self { params })
    }

    /// Hash a password into a PHC-formatted string.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::HashingFailed` if hashing fails.
    pub fn hash(&self, password: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());

        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CredentialError::HashingFailed(format!("Hashing failed: {e}")))?;

        Ok(hash.to_string())
    }

    /// Verify a password against a PHC hash.
    ///
    /// Returns `Ok(true)` if the password matches, `Ok(false)` if not.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::InvalidHashFormat` if the hash format is invalid.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, CredentialError> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|_| CredentialError::InvalidHashFormat)?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());

        // Parameters embedded in the hash take precedence over ours.
        Ok(argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

/// Check whether a stored value looks like a PHC hash produced by this module.
#[must_use]
pub fn is_phc_hash(value: &str) -> bool {
    value.starts_with("$argon2")
}
