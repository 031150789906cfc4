//! ILS driver capability trait.

use crate::error::{IlsError, IlsResult};
use crate::holding::Holding;
use crate::profile::{PatronProfile, ProfileUpdate};
use async_trait::async_trait;
use libris_core::AuthError;

/// Status reported when the ILS answered 2xx but its reply signalled an error.
pub const REPLY_ERROR_STATUS: u16 = 400;

/// Operations the integration core needs from an ILS.
///
/// Implementations hold only their explicit configuration and a transport;
/// they are shared as `Arc<dyn IlsDriver>`.
#[async_trait]
pub trait IlsDriver: Send + Sync {
    /// Short dialect name used in logs and errors.
    fn dialect(&self) -> &'static str;

    /// Check credentials and return the patron's profile.
    ///
    /// A definitive rejection is [`AuthError::InvalidCredentials`]; an
    /// unreachable or misbehaving ILS is [`AuthError::TransportFailure`].
    async fn authenticate_patron(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<PatronProfile, AuthError>;

    /// Full profile, including every address and contact entry.
    async fn fetch_profile(&self, external_id: &str) -> IlsResult<PatronProfile>;

    /// Copies of a bibliographic record with resolved availability.
    async fn fetch_holdings(
        &self,
        record_id: &str,
        patron: Option<&PatronProfile>,
    ) -> IlsResult<Vec<Holding>>;

    /// Write fields back to the ILS.
    async fn update_profile(&self, external_id: &str, update: &ProfileUpdate) -> IlsResult<()>;

    /// Record ids catalogued within the last `days_old` days.
    async fn find_new_items(&self, days_old: u32) -> IlsResult<Vec<String>>;

    /// Register a new patron and return its ILS primary id.
    async fn create_patron(&self, _profile: &PatronProfile, _secret: &str) -> IlsResult<String> {
        Err(IlsError::Unsupported {
            dialect: self.dialect(),
            operation: "create_patron",
        })
    }
}

/// Map an ILS failure during authentication onto the auth taxonomy.
pub(crate) fn auth_failure(err: IlsError) -> AuthError {
    match err {
        IlsError::Rejected { .. } => AuthError::InvalidCredentials,
        other => AuthError::TransportFailure(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failure_mapping() {
        assert_eq!(
            auth_failure(IlsError::Rejected {
                status: 401,
                message: "no".into()
            }),
            AuthError::InvalidCredentials
        );
        assert!(matches!(
            auth_failure(IlsError::server_error(503, "down")),
            AuthError::TransportFailure(_)
        ));
        assert!(matches!(
            auth_failure(IlsError::MalformedResponse("eof".into())),
            AuthError::TransportFailure(_)
        ));
    }
}
