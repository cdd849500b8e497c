// ============================
// crates/backend-lib/src/storage.rs
// ============================
//! Credential store abstraction with in-memory and flat-file implementations.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tokio::fs as tokio_fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{IssuedToken, User};

/// Persistence for accounts and issued tokens
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up an account by exact email
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Look up an account by id
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Insert or replace an account
    async fn save_user(&self, user: User) -> Result<User, AppError>;

    /// Tokens of `user_id` that are still active, oldest first
    async fn find_valid_tokens_by_user(&self, user_id: Uuid)
        -> Result<Vec<IssuedToken>, AppError>;

    /// Look up a token record regardless of its status
    async fn find_token(&self, token: &str) -> Result<Option<IssuedToken>, AppError>;

    /// Insert or replace one token record
    async fn save_token(&self, token: IssuedToken) -> Result<(), AppError>;

    /// Insert or replace several token records
    async fn save_tokens(&self, tokens: Vec<IssuedToken>) -> Result<(), AppError>;
}

#[derive(Default)]
struct MemoryInner {
    users: HashMap<Uuid, User>,
    emails: HashMap<String, Uuid>,
    tokens: HashMap<String, IssuedToken>,
}

/// Process-local store; contents are lost on restart
#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    inner: Arc<RwLock<MemoryInner>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts
    pub fn user_count(&self) -> usize {
        self.inner.read().users.len()
    }

    /// Every token record of a user, tombstones included
    pub fn tokens_of(&self, user_id: Uuid) -> Vec<IssuedToken> {
        let inner = self.inner.read();
        let mut tokens: Vec<IssuedToken> = inner
            .tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tokens.sort_by_key(|t| t.created_at);
        tokens
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let inner = self.inner.read();
        Ok(inner
            .emails
            .get(email)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.inner.read().users.get(&id).cloned())
    }

    async fn save_user(&self, user: User) -> Result<User, AppError> {
        let mut inner = self.inner.write();
        inner.emails.insert(user.email.clone(), user.id);
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_valid_tokens_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<IssuedToken>, AppError> {
        Ok(self
            .tokens_of(user_id)
            .into_iter()
            .filter(IssuedToken::is_active)
            .collect())
    }

    async fn find_token(&self, token: &str) -> Result<Option<IssuedToken>, AppError> {
        Ok(self.inner.read().tokens.get(token).cloned())
    }

    async fn save_token(&self, token: IssuedToken) -> Result<(), AppError> {
        self.inner.write().tokens.insert(token.token.clone(), token);
        Ok(())
    }

    async fn save_tokens(&self, tokens: Vec<IssuedToken>) -> Result<(), AppError> {
        let mut inner = self.inner.write();
        for token in tokens {
            inner.tokens.insert(token.token.clone(), token);
        }
        Ok(())
    }
}

/// Flat-file store.
///
/// Layout under `root`:
/// - `users/<base64url(sha256(email))>.json` one account per file
/// - `tokens/<user_id>.json` every token record of that account
///
/// Lookups by id and by token string go through indexes rebuilt from disk
/// when the store is opened.
#[derive(Clone)]
pub struct FlatFileCredentialStore {
    root: PathBuf,
    /// user id -> email
    user_index: Arc<DashMap<Uuid, String>>,
    /// token string -> owning user id
    token_index: Arc<DashMap<String, Uuid>>,
    write_lock: Arc<Mutex<()>>,
}

impl FlatFileCredentialStore {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("users"))?;
        fs::create_dir_all(root.join("tokens"))?;

        let user_index = DashMap::new();
        for entry in fs::read_dir(root.join("users"))? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let user: User = serde_json::from_str(&fs::read_to_string(&path)?)?;
                user_index.insert(user.id, user.email);
            }
        }

        let token_index = DashMap::new();
        for entry in fs::read_dir(root.join("tokens"))? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let tokens: Vec<IssuedToken> = serde_json::from_str(&fs::read_to_string(&path)?)?;
                for token in tokens {
                    token_index.insert(token.token, token.user_id);
                }
            }
        }

        tracing::debug!(
            root = %root.display(),
            users = user_index.len(),
            tokens = token_index.len(),
            "opened flat-file credential store"
        );

        Ok(Self {
            root,
            user_index: Arc::new(user_index),
            token_index: Arc::new(token_index),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Digest-named so every valid email fits in one file name
    fn user_path(&self, email: &str) -> PathBuf {
        let digest = Sha256::digest(email.as_bytes());
        self.root
            .join("users")
            .join(format!("{}.json", URL_SAFE_NO_PAD.encode(digest)))
    }

    fn tokens_path(&self, user_id: Uuid) -> PathBuf {
        self.root.join("tokens").join(format!("{user_id}.json"))
    }

    async fn read_tokens(&self, user_id: Uuid) -> Result<Vec<IssuedToken>, AppError> {
        Ok(Self::read_json(&self.tokens_path(user_id))
            .await?
            .unwrap_or_default())
    }

    /// A missing file reads as `None`; any other I/O failure is an error
    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, AppError> {
        match tokio_fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Write through a temp file so readers never see a torn file
    async fn write_json<T: serde::Serialize + ?Sized>(
        path: &Path,
        value: &T,
    ) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Merge records into the token file of one user. Caller holds `write_lock`.
    async fn upsert_tokens(&self, user_id: Uuid, records: Vec<IssuedToken>) -> Result<(), AppError> {
        let mut tokens = self.read_tokens(user_id).await?;
        for record in records {
            match tokens.iter_mut().find(|t| t.token == record.token) {
                Some(existing) => *existing = record,
                None => tokens.push(record),
            }
        }
        Self::write_json(&self.tokens_path(user_id), &tokens).await?;
        for token in &tokens {
            self.token_index.insert(token.token.clone(), token.user_id);
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FlatFileCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user: Option<User> = Self::read_json(&self.user_path(email)).await?;
        // Digest collisions are not expected, but keep the lookup exact
        Ok(user.filter(|user| user.email == email))
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let email = match self.user_index.get(&id) {
            Some(email) => email.clone(),
            None => return Ok(None),
        };
        self.find_user_by_email(&email).await
    }

    async fn save_user(&self, user: User) -> Result<User, AppError> {
        let _guard = self.write_lock.lock().await;
        Self::write_json(&self.user_path(&user.email), &user).await?;
        self.user_index.insert(user.id, user.email.clone());
        Ok(user)
    }

    async fn find_valid_tokens_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<IssuedToken>, AppError> {
        let mut tokens: Vec<IssuedToken> = self
            .read_tokens(user_id)
            .await?
            .into_iter()
            .filter(IssuedToken::is_active)
            .collect();
        tokens.sort_by_key(|t| t.created_at);
        Ok(tokens)
    }

    async fn find_token(&self, token: &str) -> Result<Option<IssuedToken>, AppError> {
        let user_id = match self.token_index.get(token) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self
            .read_tokens(user_id)
            .await?
            .into_iter()
            .find(|t| t.token == token))
    }

    async fn save_token(&self, token: IssuedToken) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        self.upsert_tokens(token.user_id, vec![token]).await
    }

    async fn save_tokens(&self, tokens: Vec<IssuedToken>) -> Result<(), AppError> {
        let mut by_user: HashMap<Uuid, Vec<IssuedToken>> = HashMap::new();
        for token in tokens {
            by_user.entry(token.user_id).or_default().push(token);
        }

        let _guard = self.write_lock.lock().await;
        for (user_id, records) in by_user {
            self.upsert_tokens(user_id, records).await?;
        }
        Ok(())
    }
}
