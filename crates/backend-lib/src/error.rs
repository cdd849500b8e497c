// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("User with the given email already exists")]
    DuplicateUser,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User not found with email: {0}")]
    UserNotFound(String),

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Token was never issued")]
    UnknownToken,

    #[error("Authentication rate limit exceeded")]
    AuthRateLimited,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidOrExpiredToken
            | AppError::MalformedToken(_)
            | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::TokenRevoked | AppError::UnknownToken => {
                StatusCode::UNAUTHORIZED
            },
            AppError::UserNotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateUser => StatusCode::CONFLICT,
            AppError::RateLimitExceeded | AppError::AuthRateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "AUTH_001",
            AppError::TokenRevoked => "AUTH_002",
            AppError::UnknownToken => "AUTH_003",
            AppError::AuthRateLimited => "AUTH_004",
            AppError::InvalidOrExpiredToken => "TOKEN_001",
            AppError::MalformedToken(_) => "TOKEN_002",
            AppError::DuplicateUser => "USER_001",
            AppError::UserNotFound(_) => "USER_002",
            AppError::RateLimitExceeded => "RATE_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::Crypto(_) => "CRYPTO_001",
            AppError::Internal(_) => "INT_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::DuplicateUser => "User with the given email already exists".to_string(),
            AppError::InvalidCredentials => "Authentication failed".to_string(),
            AppError::TokenRevoked | AppError::UnknownToken => {
                "Authentication failed".to_string()
            },
            AppError::UserNotFound(_) => "User not found".to_string(),
            AppError::InvalidOrExpiredToken | AppError::MalformedToken(_) => {
                "Invalid token or user already verified".to_string()
            },
            AppError::AuthRateLimited => {
                "Too many authentication attempts, please try again later".to_string()
            },
            AppError::RateLimitExceeded => {
                "Rate limit exceeded, please try again later".to_string()
            },
            AppError::InvalidInput(_) => "Invalid input provided".to_string(),
            AppError::Crypto(_) | AppError::Internal(_) | AppError::Io(_) => {
                "An internal server error occurred".to_string()
            },
            AppError::Json(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "request failed");
        }

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::InvalidOrExpiredToken,
            _ => AppError::MalformedToken(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("background task failed: {err}"))
    }
}
