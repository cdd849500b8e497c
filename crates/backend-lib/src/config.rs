// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "authkeeper.toml";

/// Prefix of environment variable overrides, e.g. `AUTHKEEPER_JWT_SECRET`
pub const ENV_PREFIX: &str = "AUTHKEEPER_";

const MIN_SECRET_BYTES: usize = 32;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Data directory path (flat-file store)
    pub data_dir: PathBuf,
    /// Log level
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// HMAC secret used to sign bearer tokens
    pub jwt_secret: String,
    /// Token TTL in seconds
    pub token_ttl_secs: u64,
    /// Prefix the verification token is appended to
    pub verification_link_base: String,
    /// Prefix the reset token is appended to
    pub reset_link_base: String,
    /// Which credential store backs the service
    pub store: StoreKind,
    /// Which password hashing scheme new hashes use
    pub password_hash: HashScheme,
    /// Password requirements
    pub password_requirements: PasswordRequirements,
    /// Login throttling
    pub login_throttle: LoginThrottleSettings,
    /// Request rate limiting
    pub rate_limit: RateLimitSettings,
    /// Outbound mail relay; log-only notifications when absent
    pub smtp: Option<SmtpSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Memory,
    FlatFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashScheme {
    Scrypt,
    Argon2,
}

/// Password complexity requirements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordRequirements {
    /// Minimum password length
    pub min_length: usize,
    /// Maximum password length
    pub max_length: usize,
    /// Require uppercase letters
    pub require_uppercase: bool,
    /// Require lowercase letters
    pub require_lowercase: bool,
    /// Require digits
    pub require_digit: bool,
    /// Require special characters
    pub require_special: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginThrottleSettings {
    /// Consecutive failures before an email is locked
    pub max_failures: u32,
    /// Lockout length in seconds
    pub lockout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Requests allowed per client per window
    pub max_requests: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender mailbox, e.g. `Accounts <no-reply@example.com>`
    pub from: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 4321)),
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            log_json: false,
            jwt_secret: String::new(),
            token_ttl_secs: 60 * 60 * 24, // 24 hours
            verification_link_base: "http://localhost:4321/api/v1/auth/verifyEmailToken?token="
                .to_string(),
            reset_link_base: "http://localhost:5173/enter-new-password?token=".to_string(),
            store: StoreKind::FlatFile,
            password_hash: HashScheme::Scrypt,
            password_requirements: PasswordRequirements::default(),
            login_throttle: LoginThrottleSettings::default(),
            rate_limit: RateLimitSettings::default(),
            smtp: None,
        }
    }
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
            require_special: false,
        }
    }
}

impl Default for LoginThrottleSettings {
    fn default() -> Self {
        Self {
            max_failures: 5,
            lockout_secs: 5 * 60,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 60,
        }
    }
}

impl Settings {
    /// Load settings from `authkeeper.toml` and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load settings from an explicit file, then the environment.
    ///
    /// A missing file is not an error; defaults and env vars still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the service cannot run safely with
    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.len() < MIN_SECRET_BYTES {
            bail!("jwt_secret must be at least {MIN_SECRET_BYTES} bytes");
        }
        if self.token_ttl_secs == 0 {
            bail!("token_ttl_secs must be greater than zero");
        }
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            bail!("unknown log_level {:?}", self.log_level);
        }
        if self.password_requirements.min_length < 8 {
            bail!("password_requirements.min_length must be at least 8");
        }
        if self.password_requirements.max_length < self.password_requirements.min_length {
            bail!("password_requirements.max_length is below min_length");
        }
        if self.login_throttle.max_failures == 0 {
            bail!("login_throttle.max_failures must be greater than zero");
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            bail!("rate_limit values must be greater than zero");
        }
        Ok(())
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}
