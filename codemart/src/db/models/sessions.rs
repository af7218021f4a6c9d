//! Database models for login sessions.

use crate::types::UserId;
use chrono::{DateTime, Utc};

/// A persisted session.
///
/// `id` is the SHA-256 digest (hex) of the cookie value; the raw value is never stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
