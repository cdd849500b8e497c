// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Request validation module.

use authkeeper_common::{
    AuthenticationRequest, ChangePasswordRequest, RegisterRequest, ResetPasswordRequest,
};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::auth::validate_password_strength;
use crate::config::PasswordRequirements;
use crate::error::AppError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit
const MAX_NAME_LENGTH: usize = 100;
const MAX_OPAQUE_FIELD_LENGTH: usize = 64;
const MAX_TOKEN_LENGTH: usize = 4096;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());
static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^<>/\\{}()\[\];]*$").unwrap());
/// Three base64url segments, the last one may be empty for unsigned input
static TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*$").unwrap());

/// Possible validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            // A token that cannot be a JWT is reported like any other bad token
            ValidationError::InvalidToken(reason) => AppError::MalformedToken(reason),
            other => AppError::InvalidInput(other.to_string()),
        }
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate an email address
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    if email.is_empty() {
        return Err(ValidationError::InvalidEmail(
            "Email address cannot be empty".to_string(),
        ));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "Email address cannot exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "Invalid email address format".to_string(),
        ));
    }

    Ok(email)
}

/// Validate a first or last name
pub fn validate_name(name: &str) -> ValidationResult<&str> {
    if name.trim().is_empty() {
        return Err(ValidationError::InvalidName(
            "Name must not be empty".to_string(),
        ));
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::InvalidName(format!(
            "Name must be between 1 and {MAX_NAME_LENGTH} characters"
        )));
    }

    if !NAME_REGEX.is_match(name) {
        return Err(ValidationError::InvalidName(
            "Name contains invalid characters".to_string(),
        ));
    }

    Ok(name)
}

/// Validate a new password against the configured requirements
pub fn validate_password<'a>(
    password: &'a str,
    requirements: &PasswordRequirements,
) -> ValidationResult<&'a str> {
    if !validate_password_strength(password, requirements) {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must be between {} and {} characters{}",
            requirements.min_length,
            requirements.max_length,
            complexity_hint(requirements),
        )));
    }
    Ok(password)
}

fn complexity_hint(requirements: &PasswordRequirements) -> String {
    let mut parts = Vec::new();
    if requirements.require_uppercase {
        parts.push("an uppercase letter");
    }
    if requirements.require_lowercase {
        parts.push("a lowercase letter");
    }
    if requirements.require_digit {
        parts.push("a digit");
    }
    if requirements.require_special {
        parts.push("a special character");
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" and contain {}", parts.join(", "))
    }
}

/// Cheap shape check before a token reaches the codec
pub fn validate_token(token: &str) -> ValidationResult<&str> {
    if token.is_empty() {
        return Err(ValidationError::InvalidToken(
            "Token must not be empty".to_string(),
        ));
    }

    if token.len() > MAX_TOKEN_LENGTH || !TOKEN_REGEX.is_match(token) {
        return Err(ValidationError::InvalidToken(
            "Invalid token format".to_string(),
        ));
    }

    Ok(token)
}

fn validate_opaque(field: &'static str, value: Option<&str>) -> ValidationResult<()> {
    match value {
        Some(v) if v.chars().count() > MAX_OPAQUE_FIELD_LENGTH => {
            Err(ValidationError::InvalidField {
                field,
                reason: format!("must not exceed {MAX_OPAQUE_FIELD_LENGTH} characters"),
            })
        },
        _ => Ok(()),
    }
}

/// Validate a registration request
pub fn validate_register(
    request: &RegisterRequest,
    requirements: &PasswordRequirements,
) -> ValidationResult<()> {
    validate_email(&request.email)?;
    validate_name(&request.firstname)?;
    validate_name(&request.lastname)?;
    validate_password(&request.password, requirements)?;
    validate_opaque("businessUnit", request.business_unit.as_deref())?;
    validate_opaque("employeeId", request.employee_id.as_deref())?;
    Ok(())
}

/// Validate a login request. Password rules are not applied: accounts
/// created under older rules must still be able to log in.
pub fn validate_login(request: &AuthenticationRequest) -> ValidationResult<()> {
    validate_email(&request.email)?;
    if request.password.is_empty() {
        return Err(ValidationError::InvalidPassword(
            "Password must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validate a reset-password request
pub fn validate_reset(
    request: &ResetPasswordRequest,
    requirements: &PasswordRequirements,
) -> ValidationResult<()> {
    validate_token(&request.token)?;
    validate_password(&request.new_password, requirements)?;
    Ok(())
}

/// Validate a change-password request
pub fn validate_change_password(
    request: &ChangePasswordRequest,
    requirements: &PasswordRequirements,
) -> ValidationResult<()> {
    validate_email(&request.email)?;
    if request.old_password.is_empty() {
        return Err(ValidationError::InvalidPassword(
            "Old password must not be empty".to_string(),
        ));
    }
    validate_password(&request.new_password, requirements)?;
    Ok(())
}
