//! Synchronization errors.

use libris_core::AuthError;
use libris_db::StoreError;
use libris_ils::IlsError;
use thiserror::Error;

/// Status used when the ILS could not be reached during a write-back.
pub const WRITE_BACK_UNREACHABLE_STATUS: u16 = 502;

/// Errors from identity synchronization and the password flows.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Webhook method other than CREATE, UPDATE or DELETE.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Patron not found: {0}")]
    PatronNotFound(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The ILS refused a write-back. Carries the status it answered with.
    #[error("ILS write-back failed (status {status}): {message}")]
    WriteBack { status: u16, message: String },

    /// New password and confirmation differ, or the password is blank.
    #[error("Password and confirmation do not match")]
    PasswordMismatch,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ils(#[from] IlsError),
}

impl SyncError {
    /// Wrap a failed ILS write-back, keeping the upstream status.
    #[must_use]
    pub fn write_back(err: IlsError) -> Self {
        SyncError::WriteBack {
            status: err
                .upstream_status()
                .unwrap_or(WRITE_BACK_UNREACHABLE_STATUS),
            message: err.to_string(),
        }
    }

    /// HTTP status reported to the caller.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            SyncError::UnsupportedOperation(_) => 405,
            SyncError::PatronNotFound(_) => 404,
            SyncError::InvalidPayload(_) | SyncError::PasswordMismatch => 400,
            SyncError::WriteBack { status, .. } => *status,
            SyncError::Auth(AuthError::Blank) => 400,
            SyncError::Auth(AuthError::TransportFailure(_)) => 503,
            SyncError::Auth(_) => 401,
            SyncError::Store(e) if e.is_conflict() => 409,
            SyncError::Ils(IlsError::Unsupported { .. }) => 501,
            SyncError::Store(_) | SyncError::Ils(_) => 500,
        }
    }

    /// Short machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::UnsupportedOperation(_) | SyncError::Ils(IlsError::Unsupported { .. }) => {
                "unsupported_operation"
            }
            SyncError::PatronNotFound(_) => "patron_not_found",
            SyncError::InvalidPayload(_) => "invalid_payload",
            SyncError::WriteBack { .. } => "ils_write_back_failed",
            SyncError::PasswordMismatch => "password_mismatch",
            SyncError::Auth(e) => e.message_key(),
            SyncError::Store(e) if e.is_conflict() => "identity_conflict",
            SyncError::Store(e) if e.is_configuration() => "configuration_error",
            SyncError::Store(_) => "store_error",
            SyncError::Ils(_) => "ils_error",
        }
    }
}
