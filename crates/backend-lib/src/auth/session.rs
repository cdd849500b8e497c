// ============================
// crates/backend-lib/src/auth/session.rs
// ============================
//! Account and bearer-token lifecycle.
//!
//! Every operation follows the same shape: read the store, optionally mint a
//! token or send a notification, write the store. Sequences that read and
//! then rewrite one account (revoke-then-insert, check-then-create,
//! read-modify-write of the user record) run under a per-account lock so two
//! concurrent logins cannot both leave an active token behind.
use std::sync::Arc;

use ::metrics::counter;
use authkeeper_common::{
    AuthenticationRequest, AuthenticationResponse, ChangePasswordRequest, RegisterRequest,
    StatusKind,
};
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;
use zeroize::Zeroize;

use super::password::CredentialHasher;
use super::rate_limit::LoginThrottle;
use super::token::TokenCodec;
use crate::error::AppError;
use crate::metrics::{
    LOGIN_FAILED, LOGIN_SUCCEEDED, NOTIFY_FAILED, PASSWORD_RESET, TOKEN_ISSUED, TOKEN_REVOKED,
    USER_REGISTERED,
};
use crate::models::{IssuedToken, TokenStatus, User};
use crate::notify::Notifier;
use crate::storage::CredentialStore;

const VERIFICATION_SUBJECT: &str = "email verification";
const RESET_SUBJECT: &str = "forgot password";

/// Link prefixes the emailed tokens are appended to
#[derive(Debug, Clone)]
pub struct NotificationLinks {
    pub verification_base: String,
    pub reset_base: String,
}

impl Default for NotificationLinks {
    fn default() -> Self {
        Self {
            verification_base: "http://localhost:4321/api/v1/auth/verifyEmailToken?token="
                .to_string(),
            reset_base: "http://localhost:5173/enter-new-password?token=".to_string(),
        }
    }
}

/// Result of a change-password request. A wrong old password is an
/// expected outcome, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordChange {
    Changed,
    Mismatch,
}

impl PasswordChange {
    pub fn status(self) -> StatusKind {
        match self {
            PasswordChange::Changed => StatusKind::PasswordChanged,
            PasswordChange::Mismatch => StatusKind::PasswordMismatch,
        }
    }
}

/// Per-account lock held by one operation. The map entry is dropped with
/// the last holder, so the map only tracks accounts with work in flight.
struct UserLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    email: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Waiters cloned the Arc under the shard lock, so a count of one
        // means nobody else can still reach this mutex
        self.locks
            .remove_if(&self.email, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Orchestrates registration, login, verification and password flows
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn CredentialHasher>,
    notifier: Arc<dyn Notifier>,
    codec: TokenCodec,
    links: NotificationLinks,
    throttle: LoginThrottle,
    user_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn CredentialHasher>,
        notifier: Arc<dyn Notifier>,
        codec: TokenCodec,
    ) -> Self {
        Self {
            store,
            hasher,
            notifier,
            codec,
            links: NotificationLinks::default(),
            throttle: LoginThrottle::default(),
            user_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn with_links(mut self, links: NotificationLinks) -> Self {
        self.links = links;
        self
    }

    pub fn with_throttle(mut self, throttle: LoginThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn throttle(&self) -> &LoginThrottle {
        &self.throttle
    }

    /// Create an unverified account and email it a verification link
    pub async fn register(
        &self,
        mut request: RegisterRequest,
    ) -> Result<AuthenticationResponse, AppError> {
        let guard = self.lock_user(&request.email).await;

        if self.store.find_user_by_email(&request.email).await?.is_some() {
            request.password.zeroize();
            return Err(AppError::DuplicateUser);
        }

        let password_hash = self
            .hash_password(std::mem::take(&mut request.password))
            .await?;

        let user = User {
            id: Uuid::new_v4(),
            email: request.email,
            password_hash,
            first_name: request.firstname,
            last_name: request.lastname,
            role: request.role.unwrap_or_default(),
            email_verified: false,
            business_unit: request.business_unit,
            employee_id: request.employee_id,
            created_at: Utc::now(),
        };
        let user = self.store.save_user(user).await?;

        let token = self.codec.issue(&user.email)?;
        self.record_token(&user, &token).await?;
        drop(guard);

        let link = format!("{}{}", self.links.verification_base, token);
        self.notify(&user.email, VERIFICATION_SUBJECT, &link).await;

        counter!(USER_REGISTERED).increment(1);
        tracing::info!(user_id = %user.id, role = ?user.role, "user registered");

        Ok(AuthenticationResponse::new(
            token,
            StatusKind::RegisteredPendingVerification,
        ))
    }

    /// Check credentials and replace every active token with a fresh one.
    ///
    /// Unverified accounts may log in; the status only reports it.
    pub async fn login(
        &self,
        request: AuthenticationRequest,
    ) -> Result<AuthenticationResponse, AppError> {
        let AuthenticationRequest { email, mut password } = request;

        if !self.throttle.is_allowed(&email) {
            password.zeroize();
            counter!(LOGIN_FAILED, "reason" => "throttled").increment(1);
            return Err(AppError::AuthRateLimited);
        }

        // Held from the credential check through the token swap, so a
        // concurrent reset cannot slip in between
        let guard = self.lock_user(&email).await;
        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) => {
                if self
                    .password_matches(password, user.password_hash.clone())
                    .await?
                {
                    Some(user)
                } else {
                    None
                }
            },
            None => {
                password.zeroize();
                None
            },
        };

        let Some(user) = user else {
            drop(guard);
            self.throttle.record_failure(&email);
            counter!(LOGIN_FAILED, "reason" => "credentials").increment(1);
            tracing::debug!(email = %email, "login rejected");
            return Err(AppError::InvalidCredentials);
        };
        self.throttle.record_success(&email);

        let status = if user.email_verified {
            StatusKind::LoggedIn
        } else {
            StatusKind::LoggedInUnverified
        };

        let token = self.codec.issue(&user.email)?;
        let revoked = self.revoke_all_user_tokens(&user).await?;
        self.record_token(&user, &token).await?;
        drop(guard);

        counter!(LOGIN_SUCCEEDED).increment(1);
        tracing::info!(user_id = %user.id, revoked, verified = user.email_verified, "user logged in");

        Ok(AuthenticationResponse::new(token, status))
    }

    /// Mark the token subject's email as verified. Repeating it is harmless.
    pub async fn verify_email(&self, token: &str) -> Result<StatusKind, AppError> {
        if self.codec.is_expired(token) {
            return Err(AppError::InvalidOrExpiredToken);
        }
        let email = self.codec.extract_subject(token)?;

        let _guard = self.lock_user(&email).await;
        let mut user = self.find_user(&email).await?;
        user.email_verified = true;
        let user = self.store.save_user(user).await?;

        tracing::info!(user_id = %user.id, "email verified");
        Ok(StatusKind::EmailVerified)
    }

    /// Email a reset link. Existing sessions stay valid until the reset
    /// is actually completed.
    pub async fn forgot_password(&self, email: &str) -> Result<AuthenticationResponse, AppError> {
        let user = self.find_user(email).await?;

        let token = self.codec.issue(&user.email)?;
        self.record_token(&user, &token).await?;

        let link = format!("{}{}", self.links.reset_base, token);
        self.notify(&user.email, RESET_SUBJECT, &link).await;

        tracing::info!(user_id = %user.id, "password reset requested");
        Ok(AuthenticationResponse::new(token, StatusKind::ResetLinkSent))
    }

    /// Whether a reset token may be used. No side effects.
    pub fn verify_reset_token(&self, token: &str) -> bool {
        !self.codec.is_expired(token)
    }

    /// Set a new password from a reset token, revoking every active token
    pub async fn reset_password(
        &self,
        token: &str,
        mut new_password: String,
    ) -> Result<StatusKind, AppError> {
        if self.codec.is_expired(token) {
            new_password.zeroize();
            return Err(AppError::InvalidOrExpiredToken);
        }
        let email = self.codec.extract_subject(token)?;

        let _guard = self.lock_user(&email).await;
        let mut user = self.find_user(&email).await?;
        let password_hash = self.hash_password(new_password).await?;

        let revoked = self.revoke_all_user_tokens(&user).await?;
        user.password_hash = password_hash;
        let user = self.store.save_user(user).await?;

        counter!(PASSWORD_RESET).increment(1);
        tracing::info!(user_id = %user.id, revoked, "password reset");
        Ok(StatusKind::PasswordReset)
    }

    /// Replace the password when the old one matches.
    ///
    /// Outstanding tokens are left untouched, unlike [`Self::reset_password`].
    pub async fn change_password(
        &self,
        request: ChangePasswordRequest,
    ) -> Result<PasswordChange, AppError> {
        let ChangePasswordRequest {
            email,
            old_password,
            mut new_password,
        } = request;

        let _guard = self.lock_user(&email).await;
        let mut user = match self.find_user(&email).await {
            Ok(user) => user,
            Err(err) => {
                new_password.zeroize();
                return Err(err);
            },
        };

        if !self
            .password_matches(old_password, user.password_hash.clone())
            .await?
        {
            new_password.zeroize();
            tracing::debug!(user_id = %user.id, "password change rejected: old password mismatch");
            return Ok(PasswordChange::Mismatch);
        }

        user.password_hash = self.hash_password(new_password).await?;
        let user = self.store.save_user(user).await?;

        tracing::info!(user_id = %user.id, "password changed");
        Ok(PasswordChange::Changed)
    }

    /// Resolve a bearer token to its account.
    ///
    /// The signature and lifetime must verify, the token must have been
    /// issued by this service, and it must not be tombstoned.
    pub async fn authenticate(&self, token: &str) -> Result<User, AppError> {
        let claims = self.codec.decode(token)?;

        let record = self
            .store
            .find_token(token)
            .await?
            .ok_or(AppError::UnknownToken)?;
        if !record.is_active() {
            return Err(AppError::TokenRevoked);
        }

        let user = self
            .store
            .find_user_by_id(record.user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(claims.sub.clone()))?;
        if user.email != claims.sub {
            return Err(AppError::MalformedToken(
                "subject does not match token owner".to_string(),
            ));
        }
        Ok(user)
    }

    /// Tombstone exactly the presented token
    pub async fn logout(&self, token: &str) -> Result<StatusKind, AppError> {
        let user = self.authenticate(token).await?;

        let _guard = self.lock_user(&user.email).await;
        let mut record = self
            .store
            .find_token(token)
            .await?
            .ok_or(AppError::UnknownToken)?;
        if !record.is_active() {
            return Err(AppError::TokenRevoked);
        }
        record.status = TokenStatus::Revoked;
        self.store.save_token(record).await?;

        counter!(TOKEN_REVOKED).increment(1);
        tracing::info!(user_id = %user.id, "user logged out");
        Ok(StatusKind::LoggedOut)
    }

    async fn lock_user(&self, email: &str) -> UserLockGuard {
        let lock = self
            .user_locks
            .entry(email.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        UserLockGuard {
            guard: Some(lock.lock_owned().await),
            email: email.to_string(),
            locks: Arc::clone(&self.user_locks),
        }
    }

    async fn find_user(&self, email: &str) -> Result<User, AppError> {
        self.store
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::UserNotFound(email.to_string()))
    }

    async fn record_token(&self, user: &User, token: &str) -> Result<(), AppError> {
        self.store
            .save_token(IssuedToken::bearer(token.to_string(), user.id))
            .await?;
        counter!(TOKEN_ISSUED).increment(1);
        Ok(())
    }

    /// Tombstone every active token of `user`; returns how many
    async fn revoke_all_user_tokens(&self, user: &User) -> Result<usize, AppError> {
        let mut valid = self.store.find_valid_tokens_by_user(user.id).await?;
        if valid.is_empty() {
            return Ok(0);
        }

        for token in &mut valid {
            token.status = if self.codec.is_expired(&token.token) {
                TokenStatus::Expired
            } else {
                TokenStatus::Revoked
            };
        }

        let count = valid.len();
        self.store.save_tokens(valid).await?;
        counter!(TOKEN_REVOKED).increment(count as u64);
        Ok(count)
    }

    /// Delivery is best effort: the caller's state is already committed, so a
    /// failure is logged and counted, never returned.
    async fn notify(&self, address: &str, subject: &str, body: &str) {
        if let Err(err) = self.notifier.send(address, subject, body).await {
            counter!(NOTIFY_FAILED).increment(1);
            tracing::warn!(to = address, subject, error = %err, "notification failed");
        }
    }

    /// Hash on the blocking pool; the plaintext is wiped afterwards
    async fn hash_password(&self, mut plain: String) -> Result<String, AppError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash_secure(&mut plain))
            .await?
            .map_err(|e| AppError::Crypto(e.to_string()))
    }

    async fn password_matches(&self, mut plain: String, digest: String) -> Result<bool, AppError> {
        let hasher = Arc::clone(&self.hasher);
        let matches = tokio::task::spawn_blocking(move || {
            let matches = hasher.matches(&plain, &digest);
            plain.zeroize();
            matches
        })
        .await?;
        Ok(matches)
    }
}
