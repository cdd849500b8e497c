// ============================
// crates/backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
use argon2::Argon2;
use scrypt::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Scrypt,
};
use zeroize::Zeroize;

use crate::config::{HashScheme, PasswordRequirements};

/// One-way password hashing with constant-time verification
pub trait CredentialHasher: Send + Sync {
    /// Produce a PHC-format digest of `plain`
    fn hash(&self, plain: &str) -> anyhow::Result<String>;

    /// Check `plain` against a stored digest; malformed digests never match
    fn matches(&self, plain: &str, digest: &str) -> bool;

    /// Hash a password and wipe the plaintext
    fn hash_secure(&self, plain: &mut String) -> anyhow::Result<String> {
        let hash = self.hash(plain);
        plain.zeroize();
        hash
    }
}

/// scrypt hasher
#[derive(Debug, Clone)]
pub struct ScryptHasher {
    params: scrypt::Params,
}

impl Default for ScryptHasher {
    fn default() -> Self {
        Self::new(scrypt::Params::recommended())
    }
}

impl ScryptHasher {
    pub fn new(params: scrypt::Params) -> Self {
        Self { params }
    }

    /// Recommended `r`/`p` with a custom CPU/memory cost (`log2(N)`)
    pub fn with_cost(log_n: u8) -> anyhow::Result<Self> {
        let params = scrypt::Params::new(log_n, 8, 1, 32)
            .map_err(|e| anyhow::anyhow!("invalid scrypt params: {e}"))?;
        Ok(Self::new(params))
    }
}

impl CredentialHasher for ScryptHasher {
    fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Scrypt
            .hash_password_customized(plain.as_bytes(), None, None, self.params.clone(), &salt)?
            .to_string();
        Ok(hash)
    }

    fn matches(&self, plain: &str, digest: &str) -> bool {
        verify_phc(plain, digest)
    }
}

/// Argon2id hasher
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher {
    params: argon2::Params,
}

impl Argon2Hasher {
    pub fn new(params: argon2::Params) -> Self {
        Self { params }
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            self.params.clone(),
        );
        let hash = argon2.hash_password(plain.as_bytes(), &salt)?.to_string();
        Ok(hash)
    }

    fn matches(&self, plain: &str, digest: &str) -> bool {
        verify_phc(plain, digest)
    }
}

/// Verify against whichever scheme produced the digest, so switching
/// `password_hash` in the settings does not lock out existing accounts.
fn verify_phc(plain: &str, digest: &str) -> bool {
    let parsed_hash = match PasswordHash::new(digest) {
        Ok(h) => h,
        Err(_) => return false,
    };
    let algorithm = parsed_hash.algorithm.as_str();
    if algorithm.starts_with("argon2") {
        Argon2::default()
            .verify_password(plain.as_bytes(), &parsed_hash)
            .is_ok()
    } else if algorithm == "scrypt" {
        Scrypt.verify_password(plain.as_bytes(), &parsed_hash).is_ok()
    } else {
        false
    }
}

/// Build the hasher selected in the settings
pub fn hasher_for(scheme: HashScheme) -> Box<dyn CredentialHasher> {
    match scheme {
        HashScheme::Scrypt => Box::new(ScryptHasher::default()),
        HashScheme::Argon2 => Box::new(Argon2Hasher::default()),
    }
}

/// Check if a password meets the complexity requirements
pub fn validate_password_strength(password: &str, requirements: &PasswordRequirements) -> bool {
    let len = password.chars().count();
    if len < requirements.min_length || len > requirements.max_length {
        return false;
    }

    if requirements.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
        return false;
    }

    if requirements.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
        return false;
    }

    if requirements.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    if requirements.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
        return false;
    }

    true
}
