//! Server-side login sessions.
//!
//! A successful login creates a record in the [`SessionStore`] and hands the browser an opaque
//! random reference in an HTTP-only cookie. The store only ever sees the SHA-256 digest of that
//! reference, so a leaked sessions table cannot be replayed as cookies.

use axum::http::{HeaderMap, header};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, trace};

use crate::auth::tokens::random_hex_token;
use crate::config::SessionConfig;
use crate::db::handlers::{IdentityStore, SessionStore};
use crate::db::models::users::UserDBResponse;
use crate::errors::Error;
use crate::types::{UserId, abbrev_uuid};

/// A session that was just created: the raw cookie value and its expiry.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Digest under which a session reference is stored.
pub fn hash_session_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Persist a new session for `user_id` lasting `config.timeout`.
#[instrument(skip(sessions, config), fields(user_id = %abbrev_uuid(&user_id)), err)]
pub async fn create_session(sessions: &dyn SessionStore, user_id: UserId, config: &SessionConfig) -> Result<NewSession, Error> {
    let ttl = chrono::Duration::from_std(config.timeout).map_err(|e| Error::Internal {
        operation: format!("convert session timeout: {e}"),
    })?;
    let token = random_hex_token();
    let expires_at = Utc::now() + ttl;

    sessions.create(&hash_session_token(&token), user_id, expires_at).await?;
    debug!("Session created");

    Ok(NewSession { token, expires_at })
}

/// The identity behind a session reference, or `None` if the session is unknown or expired.
pub async fn resolve_session(
    sessions: &dyn SessionStore,
    users: &dyn IdentityStore,
    token: &str,
) -> Result<Option<UserDBResponse>, Error> {
    let Some(session) = sessions.get_live(&hash_session_token(token), Utc::now()).await? else {
        trace!("No live session for presented cookie");
        return Ok(None);
    };
    Ok(users.get_by_id(session.user_id).await?)
}

/// Remove a session. Returns whether one existed.
pub async fn destroy_session(sessions: &dyn SessionStore, token: &str) -> Result<bool, Error> {
    Ok(sessions.delete(&hash_session_token(token)).await?)
}

/// The session reference from the `Cookie` header, if present and non-empty.
pub fn extract_session_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value)
}

fn same_site(config: &SessionConfig) -> &'static str {
    match config.cookie_same_site.to_ascii_lowercase().as_str() {
        "lax" => "Lax",
        "none" => "None",
        _ => "Strict",
    }
}

fn cookie_attributes(config: &SessionConfig, max_age: u64) -> String {
    let secure = if config.cookie_secure { "; Secure" } else { "" };
    format!("Path=/; HttpOnly{secure}; SameSite={}; Max-Age={max_age}", same_site(config))
}

/// `Set-Cookie` value carrying a session reference.
pub fn session_cookie(token: &str, config: &SessionConfig) -> String {
    format!(
        "{}={token}; {}",
        config.cookie_name,
        cookie_attributes(config, config.timeout.as_secs())
    )
}

/// `Set-Cookie` value that clears the session cookie.
pub fn clear_session_cookie(config: &SessionConfig) -> String {
    format!("{}=; {}", config.cookie_name, cookie_attributes(config, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::in_memory::{InMemorySessions, InMemoryUsers};
    use crate::db::models::users::UserCreateDBRequest;
    use axum::http::HeaderValue;
    use std::time::Duration;

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_extract_session_token() {
        let h = headers("theme=dark; codemart_session=abc123; other=x");
        assert_eq!(extract_session_token(&h, "codemart_session"), Some("abc123"));
        assert_eq!(extract_session_token(&h, "missing"), None);

        let cleared = headers("codemart_session=");
        assert_eq!(extract_session_token(&cleared, "codemart_session"), None);

        assert_eq!(extract_session_token(&HeaderMap::new(), "codemart_session"), None);
    }

    #[test]
    fn test_session_hash_is_stable_and_hides_token() {
        let token = random_hex_token();
        assert_eq!(hash_session_token(&token), hash_session_token(&token));
        assert_ne!(hash_session_token(&token), token);
        assert_eq!(hash_session_token(&token).len(), 64);
    }

    #[test]
    fn test_cookie_format() {
        let config = SessionConfig {
            timeout: Duration::from_secs(3600),
            cookie_name: "codemart_session".to_string(),
            cookie_secure: true,
            cookie_same_site: "lax".to_string(),
        };
        assert_eq!(
            session_cookie("abc", &config),
            "codemart_session=abc; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age=3600"
        );
        assert_eq!(
            clear_session_cookie(&config),
            "codemart_session=; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age=0"
        );

        let insecure = SessionConfig {
            cookie_secure: false,
            ..config
        };
        assert!(!session_cookie("abc", &insecure).contains("Secure"));
    }

    #[tokio::test]
    async fn test_session_round_trip_through_store() {
        let users = InMemoryUsers::new();
        let sessions = InMemorySessions::new();
        let user = users
            .create(&UserCreateDBRequest {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "00.11".to_string(),
                display_name: None,
                country_code: "NG".to_string(),
                is_admin: false,
                email_verified: true,
                verification: None,
            })
            .await
            .unwrap();

        let session = create_session(&sessions, user.id, &SessionConfig::default()).await.unwrap();
        let resolved = resolve_session(&sessions, &users, &session.token).await.unwrap().unwrap();
        assert_eq!(resolved.id, user.id);

        // The store is keyed by the digest, never the raw reference
        assert!(sessions.get_live(&session.token, Utc::now()).await.unwrap().is_none());

        assert!(destroy_session(&sessions, &session.token).await.unwrap());
        assert!(resolve_session(&sessions, &users, &session.token).await.unwrap().is_none());
    }
}
