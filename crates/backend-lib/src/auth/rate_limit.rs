// ============================
// crates/backend-lib/src/auth/rate_limit.rs
// ============================
//! Throttling of failed login attempts per account email.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::LoginThrottleSettings;

/// Entry in the throttle map
#[derive(Debug, Clone)]
struct ThrottleEntry {
    /// Consecutive failed attempts
    failed_attempts: u32,
    /// Time of the last failed attempt
    last_failure: Instant,
    /// When the current lockout ends
    lockout_expiry: Option<Instant>,
}

/// Locks an email out after too many consecutive failed logins
#[derive(Debug, Clone)]
pub struct LoginThrottle {
    attempts: Arc<DashMap<String, ThrottleEntry>>,
    max_failures: u32,
    lockout_duration: Duration,
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self::from_settings(&LoginThrottleSettings::default())
    }
}

impl LoginThrottle {
    pub fn new(max_failures: u32, lockout_duration: Duration) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            max_failures,
            lockout_duration,
        }
    }

    pub fn from_settings(settings: &LoginThrottleSettings) -> Self {
        Self::new(
            settings.max_failures,
            Duration::from_secs(settings.lockout_secs),
        )
    }

    /// Record a failed login
    pub fn record_failure(&self, email: &str) {
        let now = Instant::now();
        let mut entry = self
            .attempts
            .entry(email.to_string())
            .or_insert_with(|| ThrottleEntry {
                failed_attempts: 0,
                last_failure: now,
                lockout_expiry: None,
            });

        // A lapsed lockout starts a fresh count
        if entry.lockout_expiry.is_some_and(|expiry| now >= expiry) {
            entry.failed_attempts = 0;
            entry.lockout_expiry = None;
        }

        entry.failed_attempts += 1;
        entry.last_failure = now;

        if entry.failed_attempts >= self.max_failures && entry.lockout_expiry.is_none() {
            entry.lockout_expiry = Some(now + self.lockout_duration);
            tracing::warn!(
                email,
                attempts = entry.failed_attempts,
                lockout_secs = self.lockout_duration.as_secs(),
                "login locked out"
            );
        }
    }

    /// Record a successful login
    pub fn record_success(&self, email: &str) {
        self.attempts.remove(email);
    }

    /// Whether a login for `email` may be attempted now
    pub fn is_allowed(&self, email: &str) -> bool {
        match self.attempts.get(email) {
            Some(entry) => entry
                .lockout_expiry
                .map_or(true, |expiry| Instant::now() >= expiry),
            None => true,
        }
    }

    /// Drop lapsed lockouts and stale counters
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.attempts.retain(|_, entry| match entry.lockout_expiry {
            Some(expiry) => now < expiry,
            None => now.duration_since(entry.last_failure) < Duration::from_secs(24 * 60 * 60),
        });
    }
}
