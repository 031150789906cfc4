//! Patron persistence.
//!
//! [`PatronRepository`] is the storage seam. Both implementations enforce
//! uniqueness of `external_id` and `username` at write time and report a
//! collision as [`DbError::UniqueViolation`].

use crate::error::DbError;
use crate::models::{Patron, PatronRow};
use crate::pool::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libris_core::PatronId;
use tokio::sync::RwLock;

/// Storage operations on patrons.
#[async_trait]
pub trait PatronRepository: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Patron>, DbError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Patron>, DbError>;

    /// Insert a new patron.
    async fn insert(&self, patron: &Patron) -> Result<(), DbError>;

    /// Overwrite an existing patron, matched by `local_id`.
    async fn update(&self, patron: &Patron) -> Result<(), DbError>;

    /// Delete by external id. Returns whether a row was removed.
    async fn delete_by_external_id(&self, external_id: &str) -> Result<bool, DbError>;

    /// Stamp the last successful login.
    async fn touch_last_login(&self, id: PatronId, at: DateTime<Utc>) -> Result<(), DbError>;
}

/// PostgreSQL repository.
#[derive(Debug, Clone)]
pub struct PgPatronRepository {
    pool: DbPool,
}

impl PgPatronRepository {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Patron>, DbError> {
        let query = format!("SELECT * FROM patrons WHERE {column} = $1");
        let row: Option<PatronRow> = sqlx::query_as(&query)
            .bind(value)
            .fetch_optional(self.pool.inner())
            .await
            .map_err(DbError::from_query)?;
        row.map(Patron::try_from).transpose()
    }
}

#[async_trait]
impl PatronRepository for PgPatronRepository {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Patron>, DbError> {
        self.find_one("external_id", external_id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Patron>, DbError> {
        self.find_one("username", username).await
    }

    async fn insert(&self, patron: &Patron) -> Result<(), DbError> {
        let row = PatronRow::from(patron);
        sqlx::query(
            r"
            INSERT INTO patrons (
                id, external_id, username, display_name, email,
                password_plain, password_hash, catalog_secret_plain, catalog_secret_encrypted,
                is_one_time_password, force_password_change, loan_history_opt_in,
                created_at, last_login_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ",
        )
        .bind(row.id)
        .bind(&row.external_id)
        .bind(&row.username)
        .bind(&row.display_name)
        .bind(&row.email)
        .bind(&row.password_plain)
        .bind(&row.password_hash)
        .bind(&row.catalog_secret_plain)
        .bind(&row.catalog_secret_encrypted)
        .bind(row.is_one_time_password)
        .bind(row.force_password_change)
        .bind(row.loan_history_opt_in)
        .bind(row.created_at)
        .bind(row.last_login_at)
        .execute(self.pool.inner())
        .await
        .map_err(DbError::from_query)?;
        Ok(())
    }

    async fn update(&self, patron: &Patron) -> Result<(), DbError> {
        let row = PatronRow::from(patron);
        let result = sqlx::query(
            r"
            UPDATE patrons SET
                external_id = $2, username = $3, display_name = $4, email = $5,
                password_plain = $6, password_hash = $7,
                catalog_secret_plain = $8, catalog_secret_encrypted = $9,
                is_one_time_password = $10, force_password_change = $11,
                loan_history_opt_in = $12, last_login_at = $13
            WHERE id = $1
            ",
        )
        .bind(row.id)
        .bind(&row.external_id)
        .bind(&row.username)
        .bind(&row.display_name)
        .bind(&row.email)
        .bind(&row.password_plain)
        .bind(&row.password_hash)
        .bind(&row.catalog_secret_plain)
        .bind(&row.catalog_secret_encrypted)
        .bind(row.is_one_time_password)
        .bind(row.force_password_change)
        .bind(row.loan_history_opt_in)
        .bind(row.last_login_at)
        .execute(self.pool.inner())
        .await
        .map_err(DbError::from_query)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("patron {}", patron.local_id)));
        }
        Ok(())
    }

    async fn delete_by_external_id(&self, external_id: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM patrons WHERE external_id = $1")
            .bind(external_id)
            .execute(self.pool.inner())
            .await
            .map_err(DbError::from_query)?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_login(&self, id: PatronId, at: DateTime<Utc>) -> Result<(), DbError> {
        sqlx::query("UPDATE patrons SET last_login_at = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(at)
            .execute(self.pool.inner())
            .await
            .map_err(DbError::from_query)?;
        Ok(())
    }
}

/// In-memory repository with the same uniqueness rules.
#[derive(Debug, Default)]
pub struct InMemoryPatronRepository {
    patrons: RwLock<Vec<Patron>>,
}

impl InMemoryPatronRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored patrons.
    pub async fn len(&self) -> usize {
        self.patrons.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.patrons.read().await.is_empty()
    }

    fn conflict(existing: &[Patron], patron: &Patron) -> Option<String> {
        existing
            .iter()
            .filter(|p| p.local_id != patron.local_id)
            .find_map(|p| {
                if p.username == patron.username {
                    Some("patrons_username_key".to_string())
                } else if p.external_id.is_some() && p.external_id == patron.external_id {
                    Some("patrons_external_id_key".to_string())
                } else {
                    None
                }
            })
    }
}

#[async_trait]
impl PatronRepository for InMemoryPatronRepository {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Patron>, DbError> {
        Ok(self
            .patrons
            .read()
            .await
            .iter()
            .find(|p| p.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Patron>, DbError> {
        Ok(self
            .patrons
            .read()
            .await
            .iter()
            .find(|p| p.username == username)
            .cloned())
    }

    async fn insert(&self, patron: &Patron) -> Result<(), DbError> {
        let mut patrons = self.patrons.write().await;
        if patrons.iter().any(|p| p.local_id == patron.local_id) {
            return Err(DbError::UniqueViolation("patrons_pkey".into()));
        }
        if let Some(constraint) = Self::conflict(&patrons, patron) {
            return Err(DbError::UniqueViolation(constraint));
        }
        patrons.push(patron.clone());
        Ok(())
    }

    async fn update(&self, patron: &Patron) -> Result<(), DbError> {
        let mut patrons = self.patrons.write().await;
        if let Some(constraint) = Self::conflict(&patrons, patron) {
            return Err(DbError::UniqueViolation(constraint));
        }
        let slot = patrons
            .iter_mut()
            .find(|p| p.local_id == patron.local_id)
            .ok_or_else(|| DbError::NotFound(format!("patron {}", patron.local_id)))?;
        // created_at is immutable, as in the SQL update.
        let created_at = slot.created_at;
        *slot = patron.clone();
        slot.created_at = created_at;
        Ok(())
    }

    async fn delete_by_external_id(&self, external_id: &str) -> Result<bool, DbError> {
        let mut patrons = self.patrons.write().await;
        let before = patrons.len();
        patrons.retain(|p| p.external_id.as_deref() != Some(external_id));
        Ok(patrons.len() != before)
    }

    async fn touch_last_login(&self, id: PatronId, at: DateTime<Utc>) -> Result<(), DbError> {
        if let Some(patron) = self
            .patrons
            .write()
            .await
            .iter_mut()
            .find(|p| p.local_id == id)
        {
            patron.last_login_at = Some(at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Credential;
    use libris_auth::StoredPassword;

    fn patron(external_id: Option<&str>, username: &str) -> Patron {
        Patron {
            local_id: PatronId::new(),
            external_id: external_id.map(String::from),
            username: username.into(),
            display_name: None,
            email: None,
            credential: Credential {
                password: StoredPassword::Plaintext("pw".into()),
                catalog_secret: None,
                is_one_time_password: false,
            },
            force_password_change: false,
            loan_history_opt_in: false,
            created_at: Utc::now(),
            last_login_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = InMemoryPatronRepository::new();
        let p = patron(Some("6100"), "B6100");
        repo.insert(&p).await.unwrap();

        assert_eq!(repo.find_by_external_id("6100").await.unwrap(), Some(p.clone()));
        assert_eq!(repo.find_by_username("B6100").await.unwrap(), Some(p));
        assert!(repo.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_violations() {
        let repo = InMemoryPatronRepository::new();
        repo.insert(&patron(Some("6100"), "B6100")).await.unwrap();

        let err = repo.insert(&patron(Some("6100"), "other")).await.unwrap_err();
        assert!(err.is_unique_violation());
        let err = repo.insert(&patron(Some("6200"), "B6100")).await.unwrap_err();
        assert!(err.is_unique_violation());

        // Several local-only patrons may coexist.
        repo.insert(&patron(None, "local-1")).await.unwrap();
        repo.insert(&patron(None, "local-2")).await.unwrap();
        assert_eq!(repo.len().await, 3);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let repo = InMemoryPatronRepository::new();
        let err = repo.update(&patron(Some("1"), "u")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_by_external_id() {
        let repo = InMemoryPatronRepository::new();
        repo.insert(&patron(Some("6100"), "B6100")).await.unwrap();
        assert!(repo.delete_by_external_id("6100").await.unwrap());
        assert!(!repo.delete_by_external_id("6100").await.unwrap());
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_touch_last_login() {
        let repo = InMemoryPatronRepository::new();
        let p = patron(Some("6100"), "B6100");
        repo.insert(&p).await.unwrap();
        let at = Utc::now();
        repo.touch_last_login(p.local_id, at).await.unwrap();
        let stored = repo.find_by_username("B6100").await.unwrap().unwrap();
        assert_eq!(stored.last_login_at, Some(at));
    }
}
