//! Identity synchronization.
//!
//! Keeps the local credential store aligned with the ILS:
//!
//! - [`IdentitySynchronizer`] applies CREATE/UPDATE/DELETE patron webhooks
//!   reissues one-time passwords and registers new patrons.
//! - [`LoginService`] reconciles interactive logins and runs the
//!   one-time-password exchange.
//! - [`EmailSender`] is the outbound mail contract.

pub mod config;
pub mod email;
pub mod error;
pub mod login;
pub mod payload;
pub mod synchronizer;

pub use config::SyncConfig;
pub use email::{EmailMessage, EmailSender, LogEmailSender, MockEmailSender};
pub use error::{SyncError, WRITE_BACK_UNREACHABLE_STATUS};
pub use login::{LoginOutcome, LoginService};
pub use payload::{
    CodeValue, ContactInfo, EmailEntry, IlsUser, SyncMethod, UserIdentifier, WebhookUser,
    BARCODE_ID_TYPE,
};
pub use synchronizer::{IdentitySynchronizer, Registration, SyncAction, SyncOutcome};
