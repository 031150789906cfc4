//! # libris Auth
//!
//! Credential primitives for the local patron store.
//!
//! - Argon2id password hashing ([`PasswordHasher`])
//! - AES-256-GCM catalog-secret encryption ([`encrypt_secret`], [`decrypt_secret`])
//! - Policy-driven sealing ([`CredentialVault`])
//! - One-time password and barcode generation
//!
//! ```
//! use libris_auth::{CredentialPolicy, CredentialVault, StoredPassword};
//!
//! let vault = CredentialVault::new(CredentialPolicy::default()).unwrap();
//! let stored = vault.seal_password("otp-123").unwrap();
//! assert_eq!(stored, StoredPassword::Plaintext("otp-123".into()));
//! assert!(vault.verify_password(&stored, "otp-123").unwrap());
//! ```

pub mod error;
pub mod generate;
pub mod password;
pub mod secret;
pub mod vault;

pub use error::CredentialError;
pub use generate::{
    fallback_entropy, generate_one_time_password, BarcodeGenerator, DEFAULT_BARCODE_LENGTH,
    DEFAULT_OTP_LENGTH,
};
pub use password::{is_phc_hash, PasswordHasher};
pub use secret::{decrypt_secret, encrypt_secret, parse_key};
pub use vault::{CredentialPolicy, CredentialVault, StoredPassword, StoredSecret};
