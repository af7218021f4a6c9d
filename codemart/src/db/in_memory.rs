//! In-memory storage implementations.
//!
//! These keep every record in process and lose it on restart. They back `database.type: memory`
//! for local development and the HTTP tests, and enforce the same uniqueness and
//! token/expiry pairing rules as the PostgreSQL schema.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::auth::tokens::VerificationToken;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::{IdentityStore, SessionStore},
    models::{
        sessions::SessionRecord,
        users::{UserCreateDBRequest, UserDBResponse, UserFilter, UserUpdateDBRequest},
    },
};
use crate::types::UserId;

/// In-memory implementation of [`IdentityStore`].
///
/// A single lock guards the whole map so uniqueness checks and writes happen atomically.
#[derive(Clone, Default)]
pub struct InMemoryUsers {
    users: Arc<RwLock<HashMap<UserId, UserDBResponse>>>,
}

impl InMemoryUsers {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Uniqueness check over every record but `except`.
fn ensure_unique(
    users: &HashMap<UserId, UserDBResponse>,
    except: Option<UserId>,
    username: Option<&str>,
    email: Option<&str>,
    token: Option<&str>,
) -> Result<()> {
    for user in users.values().filter(|u| Some(u.id) != except) {
        if username.is_some_and(|n| n == user.username) {
            return Err(DbError::users_unique_violation("username"));
        }
        if email.is_some_and(|e| e == user.email) {
            return Err(DbError::users_unique_violation("email"));
        }
        if token.is_some() && token == user.verification_token.as_deref() {
            return Err(DbError::users_unique_violation("verification_token"));
        }
    }
    Ok(())
}

impl InMemoryUsers {
    fn modify<F>(&self, id: UserId, apply: F) -> Result<UserDBResponse>
    where
        F: FnOnce(&HashMap<UserId, UserDBResponse>, &mut UserDBResponse) -> Result<()>,
    {
        let mut users = self.users.write();
        let mut user = users.get(&id).cloned().ok_or(DbError::NotFound)?;
        apply(&users, &mut user)?;
        user.updated_at = Utc::now();
        users.insert(id, user.clone());
        Ok(user)
    }
}

#[async_trait::async_trait]
impl IdentityStore for InMemoryUsers {
    async fn create(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut users = self.users.write();
        ensure_unique(
            &users,
            None,
            Some(&request.username),
            Some(&request.email),
            request.verification.as_ref().map(|v| v.token.as_str()),
        )?;

        let now = Utc::now();
        let user = UserDBResponse {
            id: Uuid::new_v4(),
            username: request.username.clone(),
            email: request.email.clone(),
            password_hash: request.password_hash.clone(),
            display_name: request.display_name.clone(),
            country_code: request.country_code.clone(),
            is_admin: request.is_admin,
            email_verified: request.email_verified,
            verification_token: request.verification.as_ref().map(|v| v.token.clone()),
            verification_token_expires_at: request.verification.as_ref().map(|v| v.expires_at),
            bank_details: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        Ok(self.users.read().get(&id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        Ok(self.users.read().values().find(|u| u.username == username).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        Ok(self.users.read().values().find(|u| u.email == email).cloned())
    }

    async fn get_by_verification_token(&self, token: &str) -> Result<Option<UserDBResponse>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.verification_token.as_deref() == Some(token))
            .cloned())
    }

    async fn list(&self, filter: &UserFilter) -> Result<Vec<UserDBResponse>> {
        let mut users: Vec<UserDBResponse> = self.users.read().values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(users
            .into_iter()
            .skip(filter.skip.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    async fn update(&self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        self.modify(id, |_, user| {
            if let Some(display_name) = &request.display_name {
                user.display_name = Some(display_name.clone());
            }
            if let Some(country_code) = &request.country_code {
                user.country_code = country_code.clone();
            }
            if let Some(bank_details) = &request.bank_details {
                user.bank_details = Some(bank_details.clone());
            }
            Ok(())
        })
    }

    async fn change_email(&self, id: UserId, email: &str, verification: &VerificationToken) -> Result<UserDBResponse> {
        self.modify(id, |users, user| {
            ensure_unique(users, Some(id), None, Some(email), Some(&verification.token))?;
            user.email = email.to_string();
            user.email_verified = false;
            user.verification_token = Some(verification.token.clone());
            user.verification_token_expires_at = Some(verification.expires_at);
            Ok(())
        })
    }

    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<()> {
        self.modify(id, |_, user| {
            user.password_hash = password_hash.to_string();
            Ok(())
        })
        .map(|_| ())
    }

    async fn start_verification(&self, id: UserId, verification: &VerificationToken) -> Result<UserDBResponse> {
        self.modify(id, |users, user| {
            ensure_unique(users, Some(id), None, None, Some(&verification.token))?;
            user.verification_token = Some(verification.token.clone());
            user.verification_token_expires_at = Some(verification.expires_at);
            Ok(())
        })
    }

    async fn mark_verified(&self, id: UserId, token: &str) -> Result<Option<UserDBResponse>> {
        let verified = self.modify(id, |_, user| {
            if user.verification_token.as_deref() != Some(token) {
                return Err(DbError::NotFound);
            }
            user.email_verified = true;
            user.verification_token = None;
            user.verification_token_expires_at = None;
            Ok(())
        });

        match verified {
            Ok(user) => Ok(Some(user)),
            Err(DbError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<UserDBResponse> {
        self.modify(id, |_, user| {
            user.is_admin = is_admin;
            Ok(())
        })
    }
}

/// In-memory implementation of [`SessionStore`].
#[derive(Clone, Default)]
pub struct InMemorySessions {
    sessions: Arc<DashMap<String, SessionRecord>>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessions {
    async fn create(&self, id: &str, user_id: UserId, expires_at: DateTime<Utc>) -> Result<SessionRecord> {
        let session = SessionRecord {
            id: id.to_string(),
            user_id,
            created_at: Utc::now(),
            expires_at,
        };

        match self.sessions.entry(id.to_string()) {
            Entry::Occupied(_) => Err(DbError::UniqueViolation {
                constraint: Some("sessions_pkey".to_string()),
                table: Some("sessions".to_string()),
                message: "duplicate key value violates unique constraint \"sessions_pkey\"".to_string(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(session.clone());
                Ok(session)
            }
        }
    }

    async fn get_live(&self, id: &str, now: DateTime<Utc>) -> Result<Option<SessionRecord>> {
        Ok(self.sessions.get(id).map(|s| s.value().clone()).filter(|s| s.is_live_at(now)))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.sessions.remove(id).is_some())
    }

    async fn delete_for_user(&self, user_id: UserId, keep: Option<&str>) -> Result<u64> {
        let before = self.sessions.len();
        self.sessions
            .retain(|id, session| session.user_id != user_id || keep == Some(id.as_str()));
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.is_live_at(now));
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }
}
