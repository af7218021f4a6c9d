//! Extractors that gate handlers on the caller's session.
//!
//! - [`CurrentUser`] passes iff the request carries a live session cookie (`401` otherwise).
//! - [`AdminUser`] additionally requires the administrator flag (`403` for signed-in
//!   non-administrators, `401` when there is no session at all).
//!
//! A handler that takes neither is public.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument, trace};

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    errors::Error,
    types::Operation,
};

type Result<T> = std::result::Result<T, Error>;

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let cookie_name = &state.config.auth.native.session.cookie_name;
        let Some(token) = session::extract_session_token(&parts.headers, cookie_name) else {
            trace!("No session cookie in request");
            return Err(Error::Unauthenticated { message: None });
        };

        match session::resolve_session(state.sessions.as_ref(), state.users.as_ref(), token).await? {
            Some(user) => {
                debug!("Found session authenticated user: {}", user.id);
                Ok(CurrentUser::from(user))
            }
            None => {
                trace!("Session cookie did not resolve to a live session");
                Err(Error::Unauthenticated { message: None })
            }
        }
    }
}

/// Passes only for administrators.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        require_admin(user).map(AdminUser)
    }
}

/// Authorization predicate behind [`AdminUser`].
pub fn require_admin(user: CurrentUser) -> Result<CurrentUser> {
    if user.is_admin {
        Ok(user)
    } else {
        Err(Error::InsufficientPermissions {
            action: Operation::ReadAll,
            resource: "admin resource".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::create_session;
    use crate::db::models::users::UserCreateDBRequest;
    use crate::test_utils::create_test_state;
    use axum::http::StatusCode;
    use uuid::Uuid;

    fn user(is_admin: bool) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            display_name: None,
            country_code: "NG".to_string(),
            is_admin,
            email_verified: true,
        }
    }

    fn parts_with_cookie(cookie: Option<&str>) -> Parts {
        let mut builder = axum::http::Request::builder().uri("http://localhost/test");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn test_require_admin_function() {
        assert!(require_admin(user(true)).is_ok());

        let err = require_admin(user(false)).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_missing_cookie_is_unauthenticated() {
        let state = create_test_state();
        let mut parts = parts_with_cookie(None);

        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        // The admin gate reports missing authentication, not missing privilege
        let err = AdminUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_session_is_unauthenticated() {
        let state = create_test_state();
        let mut parts = parts_with_cookie(Some("codemart_session=deadbeef"));

        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_session_cookie_resolves_user_and_admin_gate() {
        let state = create_test_state();
        let created = state
            .users
            .create(&UserCreateDBRequest {
                username: "bob".to_string(),
                email: "bob@example.com".to_string(),
                password_hash: "00.11".to_string(),
                display_name: None,
                country_code: "GH".to_string(),
                is_admin: false,
                email_verified: true,
                verification: None,
            })
            .await
            .unwrap();
        let session = create_session(state.sessions.as_ref(), created.id, &state.config.auth.native.session)
            .await
            .unwrap();
        let cookie = format!("codemart_session={}", session.token);

        let mut parts = parts_with_cookie(Some(&cookie));
        let current = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(current.id, created.id);

        let err = AdminUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        state.users.set_admin(created.id, true).await.unwrap();
        let AdminUser(admin) = AdminUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert!(admin.is_admin);
    }
}
