//! Error types for the libris-db crate.
//!
//! Wraps `SQLx` errors with additional context.

use thiserror::Error;

/// PostgreSQL SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to establish or acquire a database connection.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A database migration failed to apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),

    /// A database query failed to execute.
    #[error("Query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),

    /// Insert collided with an existing external id or username.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored data breaks an invariant.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl DbError {
    /// Classify a query error, separating unique violations.
    #[must_use]
    pub fn from_query(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return DbError::UniqueViolation(
                    db_err
                        .constraint()
                        .map_or_else(|| db_err.message().to_string(), String::from),
                );
            }
        }
        DbError::QueryFailed(err)
    }

    /// Check if this error indicates a connection problem.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DbError::ConnectionFailed(_))
    }

    /// Check if this error is a unique constraint violation.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation(_))
    }

    /// Check if this error indicates a missing resource.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(DbError::UniqueViolation("patrons_username_key".into()).is_unique_violation());
        assert!(DbError::NotFound("patron".into()).is_not_found());
        assert!(!DbError::ValidationFailed("x".into()).is_unique_violation());
        assert!(matches!(
            DbError::from_query(sqlx::Error::RowNotFound),
            DbError::QueryFailed(_)
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            DbError::UniqueViolation("patrons_external_id_key".into()).to_string(),
            "Unique constraint violated: patrons_external_id_key"
        );
    }
}
