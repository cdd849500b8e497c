//! Bearer-token guard for account routes.
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::models::User;
use crate::{error::AppError, AppState};

/// The account behind the presented token, plus the token itself
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub token: String,
}

/// Pull the credential out of an `Authorization: Bearer <token>` header
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// A bearer that fails signature or lifetime checks is a failed
/// authentication like any revoked or unknown one
fn unauthorized(err: AppError) -> AppError {
    match err {
        AppError::InvalidOrExpiredToken | AppError::MalformedToken(_) => {
            AppError::InvalidCredentials
        },
        other => other,
    }
}

/// Reject requests without a live bearer token and expose the caller as an
/// [`AuthenticatedUser`] request extension
pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .ok_or(AppError::InvalidCredentials)?
        .to_string();

    let user = state
        .sessions
        .authenticate(&token)
        .await
        .map_err(unauthorized)?;
    tracing::debug!(user_id = %user.id, "bearer accepted");

    request
        .extensions_mut()
        .insert(AuthenticatedUser { user, token });
    Ok(next.run(request).await)
}
