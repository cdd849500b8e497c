use authkeeper_backend_lib::{
    auth::{CredentialHasher, PasswordChange, ScryptHasher, TokenCodec},
    error::AppError,
    models::TokenStatus,
    storage::CredentialStore,
};
use authkeeper_common::{ChangePasswordRequest, Role, StatusKind};

use crate::test_utils::{
    login_request, register_request, setup_memory_env, token_from_link, TEST_SECRET,
};

const EMAIL: &str = "grace@example.com";
const PW1: &str = "first-password";
const PW2: &str = "second-password";

#[tokio::test]
async fn test_register_creates_unverified_user() {
    let env = setup_memory_env();
    env.manager
        .register(register_request(EMAIL, PW1))
        .await
        .unwrap();

    let user = env.store.find_user_by_email(EMAIL).await.unwrap().unwrap();
    assert!(!user.email_verified);
    assert_eq!(user.role, Role::User);

    let hasher = ScryptHasher::with_cost(4).unwrap();
    assert_ne!(user.password_hash, PW1);
    assert!(hasher.matches(PW1, &user.password_hash));
    assert!(!hasher.matches(PW2, &user.password_hash));
}

#[tokio::test]
async fn test_duplicate_register_rejected() {
    let env = setup_memory_env();
    env.manager
        .register(register_request(EMAIL, PW1))
        .await
        .unwrap();

    let err = env
        .manager
        .register(register_request(EMAIL, PW2))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateUser));

    // The original account is untouched
    let user = env.store.find_user_by_email(EMAIL).await.unwrap().unwrap();
    assert!(ScryptHasher::with_cost(4)
        .unwrap()
        .matches(PW1, &user.password_hash));
    // Only the first registration sent a link
    assert_eq!(env.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_login_token_names_the_account() {
    let env = setup_memory_env();
    env.manager
        .register(register_request(EMAIL, PW1))
        .await
        .unwrap();

    let resp = env.manager.login(login_request(EMAIL, PW1)).await.unwrap();
    let codec = env.manager.codec();
    assert!(!codec.is_expired(&resp.access_token));
    assert_eq!(codec.extract_subject(&resp.access_token).unwrap(), EMAIL);
}

#[tokio::test]
async fn test_login_rejects_unknown_email_and_wrong_password_alike() {
    let env = setup_memory_env();
    env.manager
        .register(register_request(EMAIL, PW1))
        .await
        .unwrap();

    let unknown = env
        .manager
        .login(login_request("nobody@example.com", PW1))
        .await
        .unwrap_err();
    let wrong = env.manager.login(login_request(EMAIL, PW2)).await.unwrap_err();

    assert!(matches!(unknown, AppError::InvalidCredentials));
    assert!(matches!(wrong, AppError::InvalidCredentials));
    assert_eq!(unknown.error_code(), wrong.error_code());
}

#[tokio::test]
async fn test_second_login_revokes_first() {
    let env = setup_memory_env();
    let registered = env
        .manager
        .register(register_request(EMAIL, PW1))
        .await
        .unwrap();

    let t1 = env.manager.login(login_request(EMAIL, PW1)).await.unwrap();
    let t2 = env.manager.login(login_request(EMAIL, PW1)).await.unwrap();
    assert_ne!(t1.access_token, t2.access_token);

    let user = env.store.find_user_by_email(EMAIL).await.unwrap().unwrap();
    let active = env.store.find_valid_tokens_by_user(user.id).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].token, t2.access_token);

    for stale in [&registered.access_token, &t1.access_token] {
        let record = env.store.find_token(stale).await.unwrap().unwrap();
        assert_eq!(record.status, TokenStatus::Revoked);
    }
}

#[tokio::test]
async fn test_verify_email_is_idempotent() {
    let env = setup_memory_env();
    env.manager
        .register(register_request(EMAIL, PW1))
        .await
        .unwrap();

    let link = env.notifier.last_body("email verification").unwrap();
    let token = token_from_link(&link);

    assert_eq!(
        env.manager.verify_email(token).await.unwrap(),
        StatusKind::EmailVerified
    );
    assert_eq!(
        env.manager.verify_email(token).await.unwrap(),
        StatusKind::EmailVerified
    );

    let user = env.store.find_user_by_email(EMAIL).await.unwrap().unwrap();
    assert!(user.email_verified);

    let resp = env.manager.login(login_request(EMAIL, PW1)).await.unwrap();
    assert_eq!(resp.status, StatusKind::LoggedIn);
    assert_eq!(resp.message, "successfully login");
}

#[tokio::test]
async fn test_unverified_login_is_allowed() {
    let env = setup_memory_env();
    env.manager
        .register(register_request(EMAIL, PW1))
        .await
        .unwrap();

    let resp = env.manager.login(login_request(EMAIL, PW1)).await.unwrap();
    assert_eq!(resp.status, StatusKind::LoggedInUnverified);
    assert_eq!(resp.message, "email has to be verified");
}

#[tokio::test]
async fn test_reset_password_revokes_everything() {
    let env = setup_memory_env();
    env.manager
        .register(register_request(EMAIL, PW1))
        .await
        .unwrap();
    let session = env.manager.login(login_request(EMAIL, PW1)).await.unwrap();

    let forgot = env.manager.forgot_password(EMAIL).await.unwrap();
    assert_eq!(forgot.status, StatusKind::ResetLinkSent);
    assert!(env.manager.verify_reset_token(&forgot.access_token));

    let status = env
        .manager
        .reset_password(&forgot.access_token, PW2.to_string())
        .await
        .unwrap();
    assert_eq!(status, StatusKind::PasswordReset);

    let user = env.store.find_user_by_email(EMAIL).await.unwrap().unwrap();
    assert!(env
        .store
        .find_valid_tokens_by_user(user.id)
        .await
        .unwrap()
        .is_empty());
    assert!(matches!(
        env.manager.authenticate(&session.access_token).await,
        Err(AppError::TokenRevoked)
    ));

    let hasher = ScryptHasher::with_cost(4).unwrap();
    assert!(hasher.matches(PW2, &user.password_hash));
    assert!(!hasher.matches(PW1, &user.password_hash));
}

#[tokio::test]
async fn test_change_password_mismatch_keeps_hash() {
    let env = setup_memory_env();
    env.manager
        .register(register_request(EMAIL, PW1))
        .await
        .unwrap();
    let before = env.store.find_user_by_email(EMAIL).await.unwrap().unwrap();

    let outcome = env
        .manager
        .change_password(ChangePasswordRequest {
            email: EMAIL.to_string(),
            old_password: "not-the-password".to_string(),
            new_password: PW2.to_string(),
        })
        .await
        .unwrap();
    assert_eq!(outcome, PasswordChange::Mismatch);
    assert_eq!(outcome.status().message(), "password doesnt match");

    let after = env.store.find_user_by_email(EMAIL).await.unwrap().unwrap();
    assert_eq!(before.password_hash, after.password_hash);
}

#[tokio::test]
async fn test_change_password_unknown_user() {
    let env = setup_memory_env();
    let err = env
        .manager
        .change_password(ChangePasswordRequest {
            email: "ghost@example.com".to_string(),
            old_password: PW1.to_string(),
            new_password: PW2.to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UserNotFound(_)));
}

#[tokio::test]
async fn test_bad_tokens_fail_uniformly() {
    let env = setup_memory_env();
    env.manager
        .register(register_request(EMAIL, PW1))
        .await
        .unwrap();

    let expired = TokenCodec::new(TEST_SECRET.as_bytes(), chrono::Duration::seconds(-10))
        .issue(EMAIL)
        .unwrap();
    let foreign = TokenCodec::new(
        b"ffffffffffffffffffffffffffffffff",
        chrono::Duration::hours(1),
    )
    .issue(EMAIL)
    .unwrap();
    let garbage = "definitely.not.ajwt";

    for token in [expired.as_str(), foreign.as_str(), garbage] {
        assert!(matches!(
            env.manager.verify_email(token).await,
            Err(AppError::InvalidOrExpiredToken)
        ));
        assert!(!env.manager.verify_reset_token(token));
        assert!(matches!(
            env.manager.reset_password(token, PW2.to_string()).await,
            Err(AppError::InvalidOrExpiredToken)
        ));
    }

    let codec = env.manager.codec();
    assert!(matches!(
        codec.extract_subject(&expired),
        Err(AppError::InvalidOrExpiredToken)
    ));
    assert!(matches!(
        codec.extract_subject(&foreign),
        Err(AppError::MalformedToken(_))
    ));
    assert!(matches!(
        codec.extract_subject(garbage),
        Err(AppError::MalformedToken(_))
    ));

    // Nothing was mutated by the rejected calls
    let user = env.store.find_user_by_email(EMAIL).await.unwrap().unwrap();
    assert!(!user.email_verified);
}

#[tokio::test]
async fn test_verify_email_for_deleted_account() {
    let env = setup_memory_env();
    let token = env.manager.codec().issue("never-registered@example.com").unwrap();
    assert!(matches!(
        env.manager.verify_email(&token).await,
        Err(AppError::UserNotFound(_))
    ));
}

#[tokio::test]
async fn test_full_account_lifecycle() {
    let env = setup_memory_env();

    env.manager
        .register(register_request(EMAIL, PW1))
        .await
        .unwrap();
    let t = env.manager.login(login_request(EMAIL, PW1)).await.unwrap();

    assert!(matches!(
        env.manager.register(register_request(EMAIL, PW1)).await,
        Err(AppError::DuplicateUser)
    ));

    let t2 = env.manager.forgot_password(EMAIL).await.unwrap();
    assert_ne!(t.access_token, t2.access_token);
    // Requesting a reset does not end the current session
    assert!(env.manager.authenticate(&t.access_token).await.is_ok());

    let link = env.notifier.last_body("forgot password").unwrap();
    assert_eq!(token_from_link(&link), t2.access_token);

    env.manager
        .reset_password(&t2.access_token, PW2.to_string())
        .await
        .unwrap();
    assert!(matches!(
        env.manager.authenticate(&t.access_token).await,
        Err(AppError::TokenRevoked)
    ));

    assert!(matches!(
        env.manager.login(login_request(EMAIL, PW1)).await,
        Err(AppError::InvalidCredentials)
    ));
    let fresh = env.manager.login(login_request(EMAIL, PW2)).await.unwrap();
    let user = env.manager.authenticate(&fresh.access_token).await.unwrap();
    assert_eq!(user.email, EMAIL);
}
