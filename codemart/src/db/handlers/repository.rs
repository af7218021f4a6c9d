//! Storage traits for identities and sessions.
//!
//! Handlers only ever see `Arc<dyn IdentityStore>` and `Arc<dyn SessionStore>`, so the backend
//! (PostgreSQL in production, in-process maps in development and tests) is chosen once at
//! startup. Every implementation must report constraint failures as the matching [`DbError`]
//! variant so the HTTP layer maps them the same way regardless of backend.
//!
//! [`DbError`]: crate::db::errors::DbError

use chrono::{DateTime, Utc};

use crate::auth::tokens::VerificationToken;
use crate::db::errors::Result;
use crate::db::models::{
    sessions::SessionRecord,
    users::{UserCreateDBRequest, UserDBResponse, UserFilter, UserUpdateDBRequest},
};
use crate::types::UserId;

/// Identity records: lookup, profile edits and the email verification lifecycle.
#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert a new identity.
    ///
    /// # Errors
    /// - `UniqueViolation` if the username, email or verification token is taken
    async fn create(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse>;

    async fn get_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>>;

    /// Exact match on the handle.
    async fn get_by_username(&self, username: &str) -> Result<Option<UserDBResponse>>;

    /// Lookup by (already normalised) email address.
    async fn get_by_email(&self, email: &str) -> Result<Option<UserDBResponse>>;

    /// The identity a verification token is currently bound to, expired or not.
    async fn get_by_verification_token(&self, token: &str) -> Result<Option<UserDBResponse>>;

    /// Oldest first.
    async fn list(&self, filter: &UserFilter) -> Result<Vec<UserDBResponse>>;

    /// Apply profile edits.
    ///
    /// # Errors
    /// - `NotFound` if the identity does not exist
    async fn update(&self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse>;

    /// Replace the email address. The identity becomes unverified and `verification` replaces
    /// any pending token.
    async fn change_email(&self, id: UserId, email: &str, verification: &VerificationToken) -> Result<UserDBResponse>;

    /// Replace the stored verifier.
    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<()>;

    /// Overwrite the token/expiry pair. Previously issued tokens stop resolving.
    async fn start_verification(&self, id: UserId, verification: &VerificationToken) -> Result<UserDBResponse>;

    /// Set the verified flag and clear the token/expiry pair together, but only while `token`
    /// is still the identity's current one. Returns `None` when it is not.
    async fn mark_verified(&self, id: UserId, token: &str) -> Result<Option<UserDBResponse>>;

    async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<UserDBResponse>;
}

/// Server-side login sessions, keyed by the digest of the cookie value.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, id: &str, user_id: UserId, expires_at: DateTime<Utc>) -> Result<SessionRecord>;

    /// The session if it exists and has not expired at `now`.
    async fn get_live(&self, id: &str, now: DateTime<Utc>) -> Result<Option<SessionRecord>>;

    /// Returns whether a session was removed.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Remove every session of `user_id` except `keep`. Returns the number removed.
    async fn delete_for_user(&self, user_id: UserId, keep: Option<&str>) -> Result<u64>;

    /// Remove sessions that expired at or before `now`. Returns the number removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}
