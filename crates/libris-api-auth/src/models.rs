//! Request and response bodies.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// `POST /auth/user` body.
#[derive(Debug, Clone, Deserialize)]
pub struct UserAuthRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// `apa` selects the XML response.
    #[serde(default)]
    pub mode: Option<String>,
}

impl UserAuthRequest {
    #[must_use]
    pub fn wants_apa(&self) -> bool {
        self.mode
            .as_deref()
            .is_some_and(|m| m.trim().eq_ignore_ascii_case("apa"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    pub is_valid: bool,
    pub exists: bool,
    pub group: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryStatus {
    pub is_expired: bool,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockStatus {
    pub is_blocked: bool,
    pub reasons: Vec<String>,
}

/// Default `POST /auth/user` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserAuthResponse {
    pub user: UserStatus,
    pub expired: ExpiryStatus,
    pub blocks: BlockStatus,
}

/// `POST /auth/login` body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "Username is required"))]
    pub username: String,
    /// Bounded so oversized input never reaches the password hasher.
    #[serde(default)]
    #[validate(length(min = 1, max = 1024, message = "Password must be 1-1024 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginResponse {
    pub status: &'static str,
    pub force_password_change: bool,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// `POST /auth/password/otp` body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OtpPasswordRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "Username is required"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "One-time password is required"))]
    pub otp: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 1024, message = "New password must be 1-1024 characters"))]
    pub new_password: String,
    #[serde(default)]
    #[validate(must_match(
        other = "new_password",
        message = "Password and confirmation do not match"
    ))]
    pub confirmation: String,
}

/// `POST /auth/password/forgot` body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "Username is required"))]
    pub username: String,
    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// `POST /auth/register` body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "First name is required"))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "Last name is required"))]
    pub last_name: String,
    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    #[validate(length(max = 255, message = "Email too long"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    #[serde(default)]
    #[validate(must_match(
        other = "password",
        message = "Password and confirmation do not match"
    ))]
    pub confirmation: String,
}

/// `POST /auth/register` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterResponse {
    pub status: &'static str,
    pub external_id: String,
    /// Library card number to sign in with.
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}
