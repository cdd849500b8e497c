// ============================
// authkeeper-backend-lib/src/routes.rs
// ============================
//! HTTP surface under `/api/v1/auth`.
use std::sync::Arc;

use authkeeper_common::{
    AuthenticationRequest, AuthenticationResponse, ChangePasswordRequest, EmailRequest,
    RegisterRequest, ResetPasswordRequest, StatusKind, StatusResponse, TokenQuery, UserProfile,
    VerifyPasswordToken,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::middleware::{rate_limit, require_bearer, AuthenticatedUser};
use crate::validation;
use crate::AppState;

/// Prefix every route is mounted under
pub const API_PREFIX: &str = "/api/v1/auth";

/// Build the service router
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route_layer(from_fn_with_state(state.clone(), require_bearer));

    let auth = Router::new()
        .route("/register", post(register))
        .route("/authenticate", post(authenticate))
        .route("/verifyEmailToken", get(verify_email_token))
        .route("/forgot-password", post(forgot_password))
        .route("/verify-reset-token", post(verify_reset_token))
        .route("/reset-password", post(reset_password))
        .route("/change-password", post(change_password))
        .merge(protected);

    Router::new()
        .nest(API_PREFIX, auth)
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<AuthenticationResponse>, AppError> {
    validation::validate_register(&request, &state.settings.password_requirements)?;
    Ok(Json(state.sessions.register(request).await?))
}

async fn authenticate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AuthenticationRequest>,
) -> Result<Json<AuthenticationResponse>, AppError> {
    validation::validate_login(&request)?;
    Ok(Json(state.sessions.login(request).await?))
}

async fn verify_email_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<StatusResponse>, AppError> {
    validation::validate_token(&query.token)?;
    let status = state.sessions.verify_email(&query.token).await?;
    Ok(Json(status.into()))
}

async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EmailRequest>,
) -> Result<Json<AuthenticationResponse>, AppError> {
    validation::validate_email(&request.email)?;
    Ok(Json(state.sessions.forgot_password(&request.email).await?))
}

/// 200 with `token_valid`, or 400 with `token_expired`. Malformed and
/// foreign tokens count as expired.
async fn verify_reset_token(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyPasswordToken>,
) -> Response {
    if state.sessions.verify_reset_token(&request.token) {
        Json(StatusResponse::from(StatusKind::TokenValid)).into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::from(StatusKind::TokenExpired)),
        )
            .into_response()
    }
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    validation::validate_reset(&request, &state.settings.password_requirements)?;
    let ResetPasswordRequest { token, new_password } = request;
    let status = state.sessions.reset_password(&token, new_password).await?;
    Ok(Json(status.into()))
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    validation::validate_change_password(&request, &state.settings.password_requirements)?;
    let outcome = state.sessions.change_password(request).await?;
    Ok(Json(outcome.status().into()))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<StatusResponse>, AppError> {
    let status = state.sessions.logout(&caller.token).await?;
    Ok(Json(status.into()))
}

async fn me(Extension(caller): Extension<AuthenticatedUser>) -> Json<UserProfile> {
    Json(caller.user.profile())
}
