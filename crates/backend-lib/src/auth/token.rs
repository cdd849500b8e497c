// ============================
// crates/backend-lib/src/auth/token.rs
// ============================
//! Signed bearer token issuance and verification.
//!
//! Tokens are HS256 JWTs carrying the account email as `sub` and an absolute
//! `exp`. The same token format serves login sessions, email verification and
//! password reset; nothing in the claims tells them apart.
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Claims embedded in every token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: account email
    pub sub: String,
    /// Issued-at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// Unique token id, keeps two tokens minted in the same second distinct
    pub jti: String,
}

/// Stateless signer/verifier bound to one secret and TTL
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from the signing secret and token lifetime
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Issue a token for `subject`
    pub fn issue(&self, subject: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Crypto(format!("token encode: {e}")))
    }

    /// Decode and verify signature and expiry
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(AppError::from)
    }

    /// True unless the token verifies and is still inside its lifetime.
    /// Unparseable input counts as expired.
    pub fn is_expired(&self, token: &str) -> bool {
        self.decode(token).is_err()
    }

    /// Return the embedded email of a verified token
    pub fn extract_subject(&self, token: &str) -> Result<String, AppError> {
        self.decode(token).map(|claims| claims.sub)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
