// ============================
// crates/backend-lib/src/models.rs
// ============================
//! Persisted account and token records.
use authkeeper_common::{Role, UserProfile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Unique, matched exactly
    pub email: String,
    /// PHC-format digest
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub email_verified: bool,
    pub business_unit: Option<String>,
    pub employee_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            email: self.email.clone(),
            firstname: self.first_name.clone(),
            lastname: self.last_name.clone(),
            role: self.role,
            email_verified: self.email_verified,
            business_unit: self.business_unit.clone(),
            employee_id: self.employee_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Bearer,
}

/// Lifecycle of an issued token. Anything but `Active` is a tombstone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Active,
    /// Invalidated by login, reset or logout while still inside its lifetime
    Revoked,
    /// Its lifetime had already lapsed when it was invalidated
    Expired,
}

/// A token handed out to a user, kept after invalidation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub user_id: Uuid,
    pub token_type: TokenType,
    pub status: TokenStatus,
    pub created_at: DateTime<Utc>,
}

impl IssuedToken {
    /// Fresh active bearer token record
    pub fn bearer(token: String, user_id: Uuid) -> Self {
        Self {
            token,
            user_id,
            token_type: TokenType::Bearer,
            status: TokenStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TokenStatus::Active
    }
}
