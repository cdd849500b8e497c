// ============================
// authkeeper-backend-lib/src/lib.rs
// ============================
//! Core of the `authkeeper` credential and token service.

pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod routes;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use dashmap::DashMap;

use crate::auth::{hasher_for, CredentialHasher, LoginThrottle, NotificationLinks, SessionManager, TokenCodec};
use crate::config::{Settings, StoreKind};
use crate::middleware::rate_limit::RateLimitEntry;
use crate::notify::{LogNotifier, Notifier, SmtpNotifier};
use crate::storage::{CredentialStore, FlatFileCredentialStore, InMemoryCredentialStore};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Account and token lifecycle
    pub sessions: Arc<SessionManager>,
    /// Settings the service was started with
    pub settings: Arc<Settings>,
    /// Per-client request windows
    pub rate_limits: Arc<DashMap<String, RateLimitEntry>>,
}

impl AppState {
    /// Create a new application state around an assembled session manager
    pub fn new(sessions: SessionManager, settings: Settings) -> Self {
        Self {
            sessions: Arc::new(sessions),
            settings: Arc::new(settings),
            rate_limits: Arc::new(DashMap::new()),
        }
    }

    /// Wire the store, hasher, notifier and codec selected in `settings`
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let store: Arc<dyn CredentialStore> = match settings.store {
            StoreKind::Memory => Arc::new(InMemoryCredentialStore::new()),
            StoreKind::FlatFile => Arc::new(FlatFileCredentialStore::new(&settings.data_dir)?),
        };
        let hasher: Arc<dyn CredentialHasher> = Arc::from(hasher_for(settings.password_hash));
        let notifier: Arc<dyn Notifier> = match &settings.smtp {
            Some(smtp) => Arc::new(SmtpNotifier::new(smtp)?),
            None => {
                tracing::warn!("no smtp relay configured, notifications will only be logged");
                Arc::new(LogNotifier)
            },
        };
        let codec = TokenCodec::new(
            settings.jwt_secret.as_bytes(),
            chrono::Duration::from_std(settings.token_ttl())?,
        );

        let sessions = SessionManager::new(store, hasher, notifier, codec)
            .with_links(NotificationLinks {
                verification_base: settings.verification_link_base.clone(),
                reset_base: settings.reset_link_base.clone(),
            })
            .with_throttle(LoginThrottle::from_settings(&settings.login_throttle));

        tracing::info!(
            store = ?settings.store,
            password_hash = ?settings.password_hash,
            token_ttl_secs = settings.token_ttl_secs,
            "application state ready"
        );
        Ok(Self::new(sessions, settings))
    }
}
