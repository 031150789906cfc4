//! Local patron persistence.
//!
//! Patrons mirror ILS accounts and carry the local login credential. The
//! [`CredentialStore`] applies the credential policy on top of a
//! [`PatronRepository`], backed by PostgreSQL in production and by
//! [`InMemoryPatronRepository`] in tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use libris_auth::{CredentialPolicy, CredentialVault};
//! use libris_db::{run_migrations, CredentialStore, DbPool, PatronPatch, PgPatronRepository};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = DbPool::connect("postgres://localhost/libris").await?;
//! run_migrations(&pool).await?;
//!
//! let vault = CredentialVault::new(CredentialPolicy { hash_passwords: true, ..Default::default() })?;
//! let store = CredentialStore::new(Arc::new(PgPatronRepository::new(pool)), Arc::new(vault));
//! let patch = PatronPatch::new().with_external_id("6100").with_username("B6100").with_password("pw");
//! store.create_or_update(patch, true).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod models;
pub mod pool;
pub mod repository;
pub mod store;

pub use error::DbError;
pub use models::{Credential, Patron, PatronRow};
pub use pool::{run_migrations, DbPool, DEFAULT_MAX_CONNECTIONS};
pub use repository::{InMemoryPatronRepository, PatronRepository, PgPatronRepository};
pub use store::{CredentialStore, PatronPatch, StoreError, Upserted};
