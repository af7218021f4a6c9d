//! Database models for users.

use crate::auth::tokens::VerificationToken;
use crate::types::UserId;
use chrono::{DateTime, Utc};

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub country_code: String,
    pub is_admin: bool,
    pub email_verified: bool,
    /// Pending verification; `None` only for accounts created already verified
    pub verification: Option<VerificationToken>,
}

/// Database request for updating a user's profile.
///
/// `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub display_name: Option<String>,
    pub country_code: Option<String>,
    pub bank_details: Option<serde_json::Value>,
}

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self { skip: 0, limit: 50 }
    }
}

/// Database response for a user
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub country_code: String,
    pub is_admin: bool,
    pub email_verified: bool,
    pub verification_token: Option<String>,
    pub verification_token_expires_at: Option<DateTime<Utc>>,
    pub bank_details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserDBResponse {
    /// The pending verification token, if both halves of the pair are present.
    pub fn pending_verification(&self) -> Option<VerificationToken> {
        match (&self.verification_token, self.verification_token_expires_at) {
            (Some(token), Some(expires_at)) => Some(VerificationToken {
                token: token.clone(),
                expires_at,
            }),
            _ => None,
        }
    }
}
