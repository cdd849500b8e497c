// ================
// crates/common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between the authentication API and its clients.
//! This module defines the JSON request/response bodies and supporting types.

use serde::{Deserialize, Serialize};

/// Account role assigned at registration
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Outcome kinds reported back to clients.
///
/// Each kind has a fixed human-readable message; the HTTP layer picks the
/// status code, clients match on the kind.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    RegisteredPendingVerification,
    LoggedIn,
    LoggedInUnverified,
    EmailVerified,
    ResetLinkSent,
    TokenValid,
    TokenExpired,
    PasswordReset,
    PasswordChanged,
    PasswordMismatch,
    LoggedOut,
}

impl StatusKind {
    /// Fixed message shown to end users
    pub fn message(self) -> &'static str {
        match self {
            StatusKind::RegisteredPendingVerification => {
                "Registration successful but email has to be verified"
            },
            StatusKind::LoggedIn => "successfully login",
            StatusKind::LoggedInUnverified => "email has to be verified",
            StatusKind::EmailVerified => "Email verified successfully",
            StatusKind::ResetLinkSent => "link sent to your email for forgot password",
            StatusKind::TokenValid => "token validated successfully",
            StatusKind::TokenExpired => "Token is expired.",
            StatusKind::PasswordReset => "RESET PASSWORD successfully",
            StatusKind::PasswordChanged => "Password changed successfully",
            StatusKind::PasswordMismatch => "password doesnt match",
            StatusKind::LoggedOut => "Logged out successfully",
        }
    }
}

/// Registration request
/// # Fields
/// * `role` - Defaults to [`Role::User`] when absent
/// * `business_unit`, `employee_id` - Stored as-is, never interpreted
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub business_unit: Option<String>,
    #[serde(default)]
    pub employee_id: Option<String>,
}

/// Login request
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthenticationRequest {
    pub email: String,
    pub password: String,
}

/// Response for every call that issues a token
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponse {
    pub access_token: String,
    pub message: String,
    pub status: StatusKind,
}

impl AuthenticationResponse {
    pub fn new(access_token: String, status: StatusKind) -> Self {
        Self {
            access_token,
            message: status.message().to_string(),
            status,
        }
    }
}

/// Response for calls that only report an outcome
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    pub message: String,
    pub status: StatusKind,
}

impl From<StatusKind> for StatusResponse {
    fn from(status: StatusKind) -> Self {
        Self {
            message: status.message().to_string(),
            status,
        }
    }
}

/// Forgot-password request
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EmailRequest {
    pub email: String,
}

/// Token presented to the reset form gate
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VerifyPasswordToken {
    pub token: String,
}

/// Query string of the email verification link
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenQuery {
    pub token: String,
}

/// Reset-password request
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Change-password request
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub email: String,
    pub old_password: String,
    pub new_password: String,
}

/// Public view of the authenticated account
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub role: Role,
    pub email_verified: bool,
    pub business_unit: Option<String>,
    pub employee_id: Option<String>,
}
