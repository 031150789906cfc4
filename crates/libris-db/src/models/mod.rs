//! Database entity models.

pub mod patron;

pub use patron::{Credential, Patron, PatronRow};
