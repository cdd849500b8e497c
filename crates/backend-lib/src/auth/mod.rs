// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod password;
pub mod rate_limit;
pub mod session;
pub mod token;

pub use password::{
    hasher_for, validate_password_strength, Argon2Hasher, CredentialHasher, ScryptHasher,
};
pub use rate_limit::LoginThrottle;
pub use session::{NotificationLinks, PasswordChange, SessionManager};
pub use token::{Claims, TokenCodec};
