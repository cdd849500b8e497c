use authkeeper_backend_lib::{error::AppError, models::TokenStatus, storage::CredentialStore};
use tempfile::TempDir;

use crate::test_utils::{login_request, register_request, setup_flat_file_env};

const EMAIL: &str = "ada@example.com";
const PASSWORD: &str = "difference-engine";

#[tokio::test]
async fn test_sessions_survive_reopen() {
    let dir = TempDir::new().unwrap();

    let (first, second) = {
        let env = setup_flat_file_env(&dir);
        env.manager
            .register(register_request(EMAIL, PASSWORD))
            .await
            .unwrap();
        let first = env.manager.login(login_request(EMAIL, PASSWORD)).await.unwrap();
        let second = env.manager.login(login_request(EMAIL, PASSWORD)).await.unwrap();
        (first.access_token, second.access_token)
    };

    // A fresh store rebuilds its indexes from disk
    let env = setup_flat_file_env(&dir);
    let user = env.manager.authenticate(&second).await.unwrap();
    assert_eq!(user.email, EMAIL);

    assert!(matches!(
        env.manager.authenticate(&first).await,
        Err(AppError::TokenRevoked)
    ));
    let record = env.store.find_token(&first).await.unwrap().unwrap();
    assert_eq!(record.status, TokenStatus::Revoked);
}

#[tokio::test]
async fn test_verification_persists() {
    let dir = TempDir::new().unwrap();
    let env = setup_flat_file_env(&dir);
    let registered = env
        .manager
        .register(register_request(EMAIL, PASSWORD))
        .await
        .unwrap();
    env.manager
        .verify_email(&registered.access_token)
        .await
        .unwrap();
    drop(env);

    let env = setup_flat_file_env(&dir);
    let user = env.store.find_user_by_email(EMAIL).await.unwrap().unwrap();
    assert!(user.email_verified);
    assert_eq!(env.store.find_user_by_id(user.id).await.unwrap(), Some(user));
}

#[tokio::test]
async fn test_logout_tombstones_only_that_token() {
    let dir = TempDir::new().unwrap();
    let env = setup_flat_file_env(&dir);
    env.manager
        .register(register_request(EMAIL, PASSWORD))
        .await
        .unwrap();
    let session = env.manager.login(login_request(EMAIL, PASSWORD)).await.unwrap();
    let reset = env.manager.forgot_password(EMAIL).await.unwrap();

    env.manager.logout(&session.access_token).await.unwrap();

    assert!(matches!(
        env.manager.authenticate(&session.access_token).await,
        Err(AppError::TokenRevoked)
    ));
    // The outstanding reset token is still on record as active
    let record = env.store.find_token(&reset.access_token).await.unwrap().unwrap();
    assert!(record.is_active());
}
