//! Patron authentication endpoints.
//!
//! - `POST /auth/user`: credential check against the ILS (JSON or APA XML)
//! - `POST /auth/login`: interactive login with one-time password handling
//! - `POST /auth/password/otp`: exchange a one-time password
//! - `POST /auth/password/forgot`: request a new one-time password
//! - `POST /auth/register`: self-registration through the ILS
//!
//! Bodies are accepted as JSON or urlencoded forms.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod router;

pub use error::{ApiAuthError, ApiResult, ErrorResponse};
pub use extract::FormOrJson;
pub use router::{auth_router, AuthState};
