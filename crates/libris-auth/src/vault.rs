//! Credential policy and sealing.
//!
//! The policy is read once at startup. Every seal or verify call uses that
//! snapshot, so a single operation never mixes hashed and plaintext
//! handling.

use crate::error::CredentialError;
use crate::password::PasswordHasher;
use crate::secret::{decrypt_secret, encrypt_secret, parse_key};
use libris_core::{ConfigError, ConfigSection};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::debug;

/// A stored patron password. Exactly one representation exists at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StoredPassword {
    Plaintext(String),
    /// Argon2id PHC string.
    Hashed(String),
}

impl StoredPassword {
    #[must_use]
    pub fn is_hashed(&self) -> bool {
        matches!(self, StoredPassword::Hashed(_))
    }
}

/// The patron's ILS secret as stored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StoredSecret {
    Plain(String),
    /// base64(nonce || ciphertext || tag)
    Encrypted(String),
}

/// Credential handling policy.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialPolicy {
    pub hash_passwords: bool,
    pub encrypt_catalog_secrets: bool,
    /// 256-bit AES key; required when `encrypt_catalog_secrets` is set.
    pub encryption_key: Option<Vec<u8>>,
}

impl std::fmt::Debug for CredentialPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPolicy")
            .field("hash_passwords", &self.hash_passwords)
            .field("encrypt_catalog_secrets", &self.encrypt_catalog_secrets)
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl CredentialPolicy {
    /// Read `hash_passwords`, `encrypt_ils_password` and `ils_encryption_key`
    /// (hex) from a section.
    pub fn from_section(section: &ConfigSection) -> Result<Self, ConfigError> {
        let encryption_key = section
            .get("ils_encryption_key")
            .map(|raw| {
                parse_key(raw).map_err(|e| ConfigError::InvalidValue {
                    section: section.name().to_string(),
                    key: "ils_encryption_key".to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()?;
        Ok(Self {
            hash_passwords: section.get_bool("hash_passwords", true)?,
            encrypt_catalog_secrets: section.get_bool("encrypt_ils_password", false)?,
            encryption_key,
        })
    }
}

/// Seals and checks credentials according to a [`CredentialPolicy`].
#[derive(Debug, Clone)]
pub struct CredentialVault {
    policy: CredentialPolicy,
    hasher: PasswordHasher,
}

impl CredentialVault {
    /// Validate the policy and build a vault with the default hasher.
    ///
    /// # Errors
    ///
    /// `CredentialError::Configuration` when encryption is enabled without a
    /// usable key.
    pub fn new(policy: CredentialPolicy) -> Result<Self, CredentialError> {
        Self::with_hasher(policy, PasswordHasher::new())
    }

    /// Build a vault with a specific hasher.
    pub fn with_hasher(
        policy: CredentialPolicy,
        hasher: PasswordHasher,
    ) -> Result<Self, CredentialError> {
        if policy.encrypt_catalog_secrets {
            match &policy.encryption_key {
                None => {
                    return Err(CredentialError::Configuration(
                        "catalog secret encryption is enabled but no key is configured".into(),
                    ))
                }
                Some(key) if key.len() != crate::secret::KEY_SIZE => {
                    return Err(CredentialError::Configuration(format!(
                        "encryption key must be {} bytes, got {}",
                        crate::secret::KEY_SIZE,
                        key.len()
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(Self { policy, hasher })
    }

    #[must_use]
    pub fn policy(&self) -> &CredentialPolicy {
        &self.policy
    }

    /// Turn a plaintext password into its stored form.
    pub fn seal_password(&self, plaintext: &str) -> Result<StoredPassword, CredentialError> {
        if self.policy.hash_passwords {
            Ok(StoredPassword::Hashed(self.hasher.hash(plaintext)?))
        } else {
            Ok(StoredPassword::Plaintext(plaintext.to_string()))
        }
    }

    /// Check a candidate against a stored password.
    ///
    /// Works for either representation regardless of the current policy, so
    /// rows written under an older policy keep working.
    pub fn verify_password(
        &self,
        stored: &StoredPassword,
        candidate: &str,
    ) -> Result<bool, CredentialError> {
        match stored {
            StoredPassword::Plaintext(value) => {
                Ok(bool::from(value.as_bytes().ct_eq(candidate.as_bytes())))
            }
            StoredPassword::Hashed(hash) => self.hasher.verify(candidate, hash),
        }
    }

    /// Check if a stored password should be re-sealed under the current policy.
    #[must_use]
    pub fn needs_reseal(&self, stored: &StoredPassword) -> bool {
        stored.is_hashed() != self.policy.hash_passwords
    }

    /// Turn a plaintext catalog secret into its stored form.
    pub fn seal_catalog_secret(&self, plaintext: &str) -> Result<StoredSecret, CredentialError> {
        match (&self.policy.encryption_key, self.policy.encrypt_catalog_secrets) {
            (Some(key), true) => Ok(StoredSecret::Encrypted(encrypt_secret(plaintext, key)?)),
            _ => Ok(StoredSecret::Plain(plaintext.to_string())),
        }
    }

    /// Recover the plaintext catalog secret.
    pub fn open_catalog_secret(&self, stored: &StoredSecret) -> Result<String, CredentialError> {
        match stored {
            StoredSecret::Plain(value) => Ok(value.clone()),
            StoredSecret::Encrypted(sealed) => {
                let key = self.policy.encryption_key.as_ref().ok_or_else(|| {
                    debug!("Encrypted catalog secret found without a configured key");
                    CredentialError::Configuration(
                        "encrypted catalog secret found but no key is configured".into(),
                    )
                })?;
                decrypt_secret(sealed, key)
            }
        }
    }
}
