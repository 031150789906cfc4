//! User authentication endpoint.
//!
//! POST /auth/user - Check ILS credentials for external services.

use crate::error::{ApiAuthError, ApiResult};
use crate::extract::FormOrJson;
use crate::models::{BlockStatus, ExpiryStatus, UserAuthRequest, UserAuthResponse, UserStatus};
use crate::router::AuthState;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use libris_core::AuthError;
use libris_ils::PatronProfile;
use libris_sync::LoginOutcome;
use quick_xml::escape::escape;

/// Handle a credential check.
///
/// Definitive rejections are answered with `isValid=false` (or
/// `status=failed` in APA mode) and never reveal whether the account exists.
pub async fn user_auth_handler(
    State(state): State<AuthState>,
    FormOrJson(request): FormOrJson<UserAuthRequest>,
) -> ApiResult<Response> {
    let apa = request.wants_apa();
    let result = state
        .login
        .authenticate_with_ils(&request.username, &request.password)
        .await;

    let profile = match result {
        Ok(LoginOutcome::Authenticated {
            profile: Some(profile),
            ..
        }) => Some(profile),
        Ok(_) | Err(AuthError::InvalidCredentials) => None,
        Err(e) => return Err(ApiAuthError::Auth(e)),
    };

    if apa {
        Ok(apa_response(profile.as_ref()))
    } else {
        Ok(Json(json_response(profile.as_ref())).into_response())
    }
}

fn json_response(profile: Option<&PatronProfile>) -> UserAuthResponse {
    let Some(profile) = profile else {
        return UserAuthResponse::default();
    };
    UserAuthResponse {
        user: UserStatus {
            is_valid: true,
            exists: true,
            group: profile.group.clone(),
        },
        expired: ExpiryStatus {
            is_expired: profile.is_expired(Utc::now().date_naive()),
            date: profile.expiry_date,
        },
        blocks: BlockStatus {
            is_blocked: profile.is_blocked(),
            reasons: profile.blocks.clone(),
        },
    }
}

fn apa_response(profile: Option<&PatronProfile>) -> Response {
    let (status, userid) = match profile {
        Some(p) => ("ok", p.id.as_str()),
        None => ("failed", ""),
    };
    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<response><status>{status}</status><userid>{}</userid></response>",
        escape(userid)
    );
    ([(CONTENT_TYPE, "application/xml; charset=utf-8")], body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_json_response_for_profile() {
        let profile = PatronProfile {
            group: Some("STAFF".into()),
            expiry_date: NaiveDate::from_ymd_opt(2001, 1, 1),
            blocks: vec!["Overdue items".into()],
            ..PatronProfile::new("6100")
        };
        let body = serde_json::to_value(json_response(Some(&profile))).unwrap();
        assert_eq!(body["user"]["isValid"], true);
        assert_eq!(body["user"]["group"], "STAFF");
        assert_eq!(body["expired"]["isExpired"], true);
        assert_eq!(body["expired"]["date"], "2001-01-01");
        assert_eq!(body["blocks"]["reasons"][0], "Overdue items");
    }

    #[test]
    fn test_json_response_for_rejection() {
        let body = serde_json::to_value(json_response(None)).unwrap();
        assert_eq!(body["user"]["isValid"], false);
        assert_eq!(body["user"]["exists"], false);
        assert_eq!(body["blocks"]["isBlocked"], false);
    }
}
