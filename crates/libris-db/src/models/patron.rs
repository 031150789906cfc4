//! Patron entity model.
//!
//! A patron is the local mirror of an ILS account. Patrons without an
//! `external_id` are local-only and never synchronized.

use crate::error::DbError;
use chrono::{DateTime, Utc};
use libris_auth::{StoredPassword, StoredSecret};
use libris_core::PatronId;
use sqlx::FromRow;

/// Credential of a patron.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub password: StoredPassword,
    /// ILS password kept for catalog calls on the patron's behalf.
    pub catalog_secret: Option<StoredSecret>,
    /// The password is a one-time password awaiting exchange.
    pub is_one_time_password: bool,
}

/// A local patron record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patron {
    pub local_id: PatronId,
    pub external_id: Option<String>,
    /// Login handle (usually the barcode). Unique.
    pub username: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub credential: Credential,
    pub force_password_change: bool,
    pub loan_history_opt_in: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Patron {
    /// Check if this patron exists only locally.
    #[must_use]
    pub fn is_local_only(&self) -> bool {
        self.external_id.is_none()
    }

    /// Case-insensitive email comparison.
    #[must_use]
    pub fn email_matches(&self, email: &str) -> bool {
        self.email
            .as_deref()
            .is_some_and(|own| own.trim().eq_ignore_ascii_case(email.trim()))
    }
}

/// Row as stored in the `patrons` table.
#[derive(Debug, Clone, FromRow)]
pub struct PatronRow {
    pub id: uuid::Uuid,
    pub external_id: Option<String>,
    pub username: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub password_plain: Option<String>,
    pub password_hash: Option<String>,
    pub catalog_secret_plain: Option<String>,
    pub catalog_secret_encrypted: Option<String>,
    pub is_one_time_password: bool,
    pub force_password_change: bool,
    pub loan_history_opt_in: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl TryFrom<PatronRow> for Patron {
    type Error = DbError;

    fn try_from(row: PatronRow) -> Result<Self, Self::Error> {
        let password = match (row.password_plain, row.password_hash) {
            (Some(plain), None) => StoredPassword::Plaintext(plain),
            (None, Some(hash)) => StoredPassword::Hashed(hash),
            _ => {
                return Err(DbError::ValidationFailed(format!(
                    "patron {} must have exactly one password column set",
                    row.id
                )))
            }
        };
        let catalog_secret = match (row.catalog_secret_plain, row.catalog_secret_encrypted) {
            (None, None) => None,
            (Some(plain), None) => Some(StoredSecret::Plain(plain)),
            (None, Some(sealed)) => Some(StoredSecret::Encrypted(sealed)),
            (Some(_), Some(_)) => {
                return Err(DbError::ValidationFailed(format!(
                    "patron {} has both catalog secret columns set",
                    row.id
                )))
            }
        };

        Ok(Patron {
            local_id: PatronId::from_uuid(row.id),
            external_id: row.external_id,
            username: row.username,
            display_name: row.display_name,
            email: row.email,
            credential: Credential {
                password,
                catalog_secret,
                is_one_time_password: row.is_one_time_password,
            },
            force_password_change: row.force_password_change,
            loan_history_opt_in: row.loan_history_opt_in,
            created_at: row.created_at,
            last_login_at: row.last_login_at,
        })
    }
}

impl From<&Patron> for PatronRow {
    fn from(patron: &Patron) -> Self {
        let (password_plain, password_hash) = match &patron.credential.password {
            StoredPassword::Plaintext(plain) => (Some(plain.clone()), None),
            StoredPassword::Hashed(hash) => (None, Some(hash.clone())),
        };
        let (catalog_secret_plain, catalog_secret_encrypted) =
            match &patron.credential.catalog_secret {
                None => (None, None),
                Some(StoredSecret::Plain(plain)) => (Some(plain.clone()), None),
                Some(StoredSecret::Encrypted(sealed)) => (None, Some(sealed.clone())),
            };
        PatronRow {
            id: *patron.local_id.as_uuid(),
            external_id: patron.external_id.clone(),
            username: patron.username.clone(),
            display_name: patron.display_name.clone(),
            email: patron.email.clone(),
            password_plain,
            password_hash,
            catalog_secret_plain,
            catalog_secret_encrypted,
            is_one_time_password: patron.credential.is_one_time_password,
            force_password_change: patron.force_password_change,
            loan_history_opt_in: patron.loan_history_opt_in,
            created_at: patron.created_at,
            last_login_at: patron.last_login_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patron(password: StoredPassword) -> Patron {
        Patron {
            local_id: PatronId::new(),
            external_id: Some("6100".into()),
            username: "B6100".into(),
            display_name: Some("Jane Doe".into()),
            email: Some("Jane@Example.org".into()),
            credential: Credential {
                password,
                catalog_secret: Some(StoredSecret::Encrypted("c2VhbGVk".into())),
                is_one_time_password: true,
            },
            force_password_change: false,
            loan_history_opt_in: false,
            created_at: Utc::now(),
            last_login_at: None,
        }
    }

    #[test]
    fn test_row_has_exactly_one_password_column() {
        let hashed = PatronRow::from(&patron(StoredPassword::Hashed("$argon2id$x".into())));
        assert!(hashed.password_plain.is_none());
        assert_eq!(hashed.password_hash.as_deref(), Some("$argon2id$x"));

        let plain = PatronRow::from(&patron(StoredPassword::Plaintext("otp".into())));
        assert_eq!(plain.password_plain.as_deref(), Some("otp"));
        assert!(plain.password_hash.is_none());
    }

    #[test]
    fn test_row_conversion_keeps_credential() {
        let original = patron(StoredPassword::Plaintext("otp".into()));
        let back = Patron::try_from(PatronRow::from(&original)).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_row_with_two_passwords_is_rejected() {
        let mut row = PatronRow::from(&patron(StoredPassword::Plaintext("otp".into())));
        row.password_hash = Some("$argon2id$x".into());
        assert!(matches!(
            Patron::try_from(row),
            Err(DbError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_row_without_password_is_rejected() {
        let mut row = PatronRow::from(&patron(StoredPassword::Plaintext("otp".into())));
        row.password_plain = None;
        assert!(Patron::try_from(row).is_err());
    }

    #[test]
    fn test_email_matches_case_insensitive() {
        let p = patron(StoredPassword::Plaintext("otp".into()));
        assert!(p.email_matches("jane@example.ORG"));
        assert!(!p.email_matches("john@example.org"));
        assert!(!p.is_local_only());
    }
}
