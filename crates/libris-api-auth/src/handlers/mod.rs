//! HTTP handlers for patron authentication.

pub mod login;
pub mod password;
pub mod register;
pub mod user_auth;

pub use login::login_handler;
pub use password::{forgot_password_handler, otp_password_handler};
pub use register::register_handler;
pub use user_auth::user_auth_handler;
