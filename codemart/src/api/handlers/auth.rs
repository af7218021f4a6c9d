use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};
use chrono::Utc;
use tracing::{debug, info};

use crate::{
    AppState,
    api::{
        models::{
            auth::{
                AuthResponse, AuthSuccessResponse, ChangePasswordRequest, LoginInfo, LoginRequest, LoginResponse, LogoutResponse,
                RegisterRequest, RegisterResponse, RegistrationInfo, VerifyEmailQuery,
            },
            users::{CurrentUser, UserResponse},
        },
        validation::ValidatedJson,
    },
    auth::{
        password, session,
        tokens::{VerificationToken, is_expired_at},
        utils::{build_verify_url, normalize_country_code, normalize_email},
    },
    db::models::users::{UserCreateDBRequest, UserDBResponse},
    email::VerificationEmail,
    errors::Error,
    types::abbrev_uuid,
};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

fn ensure_native_enabled(state: &AppState) -> Result<(), Error> {
    if state.config.auth.native.enabled {
        Ok(())
    } else {
        Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        })
    }
}

/// Queue the verification mail for `user`'s pending token, if any.
pub(crate) fn send_verification(state: &AppState, user: &UserDBResponse) {
    let Some(token) = user.verification_token.as_deref() else {
        return;
    };
    state.email.dispatch(VerificationEmail {
        to_email: user.email.clone(),
        to_name: user.display_name.clone(),
        link: build_verify_url(&state.config.dashboard_url, token),
    });
}

/// Get registration information
#[utoipa::path(
    get,
    path = "/authentication/register",
    tag = "authentication",
    responses(
        (status = 200, description = "Registration info", body = RegistrationInfo),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_registration_info(State(state): State<AppState>) -> Result<Json<RegistrationInfo>, Error> {
    let enabled = state.config.auth.native.enabled && state.config.auth.native.allow_registration;
    Ok(Json(RegistrationInfo {
        enabled,
        message: if enabled {
            "Registration is enabled".to_string()
        } else {
            "Registration is disabled".to_string()
        },
    }))
}

/// Register a new user account
///
/// The account starts unverified and a verification link is emailed to the given address.
/// Registration does not sign the user in.
#[utoipa::path(
    post,
    path = "/authentication/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username or email already taken"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<RegisterResponse, Error> {
    ensure_native_enabled(&state)?;

    if !state.config.auth.native.allow_registration {
        return Err(Error::BadRequest {
            message: "User registration is disabled".to_string(),
        });
    }

    let country_code = normalize_country_code(&request.country_code).ok_or_else(|| Error::BadRequest {
        message: "Country code must be a two-letter ISO 3166-1 code".to_string(),
    })?;

    // Hash the password on a blocking thread to avoid blocking async runtime
    let password_hash = password::hash_string_blocking(request.password).await?;

    let create_request = UserCreateDBRequest {
        username: request.username,
        email: normalize_email(&request.email),
        password_hash,
        display_name: request.display_name.map(|name| name.trim().to_string()),
        country_code,
        is_admin: false,
        email_verified: false,
        verification: Some(VerificationToken::issue()),
    };

    let created_user = state.users.create(&create_request).await?;
    info!(user_id = %abbrev_uuid(&created_user.id), "User registered");

    send_verification(&state, &created_user);

    Ok(RegisterResponse {
        auth_response: AuthResponse {
            user: UserResponse::from(created_user),
            message: "Registration successful. Check your email to verify your address.".to_string(),
        },
    })
}

/// Get login information
#[utoipa::path(
    get,
    path = "/authentication/login",
    tag = "authentication",
    responses(
        (status = 200, description = "Login info", body = LoginInfo),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_login_info(State(state): State<AppState>) -> Result<Json<LoginInfo>, Error> {
    Ok(Json(LoginInfo {
        enabled: state.config.auth.native.enabled,
        message: if state.config.auth.native.enabled {
            "Native login is enabled".to_string()
        } else {
            "Native login is disabled".to_string()
        },
    }))
}

/// Login with username (or email address) and password
///
/// An unknown handle and a wrong password produce the same response.
#[utoipa::path(
    post,
    path = "/authentication/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, ValidatedJson(request): ValidatedJson<LoginRequest>) -> Result<LoginResponse, Error> {
    ensure_native_enabled(&state)?;

    // Usernames never contain '@', so a handle with one is an email address
    let handle = request.username.trim();
    let user = if handle.contains('@') {
        state.users.get_by_email(&normalize_email(handle)).await?
    } else {
        state.users.get_by_username(handle).await?
    };

    // Unknown usernames are checked against a dummy verifier so both paths cost the same
    let verifier = user.as_ref().map(|u| u.password_hash.clone());
    let is_valid = password::verify_string_blocking(request.password, verifier).await?;

    let user = match user {
        Some(user) if is_valid => user,
        _ => {
            debug!("Login rejected");
            return Err(Error::Unauthenticated {
                message: Some(INVALID_CREDENTIALS.to_string()),
            });
        }
    };

    let session_config = &state.config.auth.native.session;
    let new_session = session::create_session(state.sessions.as_ref(), user.id, session_config).await?;
    let cookie = session::session_cookie(&new_session.token, session_config);
    info!(user_id = %abbrev_uuid(&user.id), "User logged in");

    Ok(LoginResponse {
        auth_response: AuthResponse {
            user: UserResponse::from(user),
            message: "Login successful".to_string(),
        },
        cookie,
    })
}

/// Logout (destroy the session and clear the cookie)
#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<LogoutResponse, Error> {
    let session_config = &state.config.auth.native.session;

    if let Some(token) = session::extract_session_token(&headers, &session_config.cookie_name) {
        let existed = session::destroy_session(state.sessions.as_ref(), token).await?;
        debug!(existed, "Session destroyed");
    }

    Ok(LogoutResponse {
        auth_response: AuthSuccessResponse {
            message: "Logout successful".to_string(),
        },
        cookie: session::clear_session_cookie(session_config),
    })
}

/// Get the identity behind the current session
#[utoipa::path(
    get,
    path = "/authentication/session",
    tag = "authentication",
    responses(
        (status = 200, description = "Current session identity", body = CurrentUser),
        (status = 401, description = "Not authenticated"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_session(current_user: CurrentUser) -> Json<CurrentUser> {
    Json(current_user)
}

/// Verify an email address with the token from the verification link
#[utoipa::path(
    get,
    path = "/authentication/verify-email",
    tag = "authentication",
    params(VerifyEmailQuery),
    responses(
        (status = 200, description = "Email verified", body = AuthResponse),
        (status = 400, description = "Missing token"),
        (status = 404, description = "Unknown token"),
        (status = 410, description = "Token expired"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn verify_email(State(state): State<AppState>, Query(query): Query<VerifyEmailQuery>) -> Result<Json<AuthResponse>, Error> {
    let token = query.token.trim();
    if token.is_empty() {
        return Err(Error::BadRequest {
            message: "Verification token is required".to_string(),
        });
    }

    let not_found = || Error::NotFound {
        resource: "Verification token".to_string(),
        id: token.chars().take(8).collect(),
    };

    let user = state.users.get_by_verification_token(token).await?.ok_or_else(not_found)?;
    let pending = user.pending_verification().ok_or_else(not_found)?;

    if is_expired_at(pending.expires_at, Utc::now()) {
        return Err(Error::Expired {
            resource: "Verification token".to_string(),
        });
    }

    // Conditional on the token so a concurrent email change cannot be verified by a stale link
    let verified = state
        .users
        .mark_verified(user.id, &pending.token)
        .await?
        .ok_or_else(not_found)?;
    info!(user_id = %abbrev_uuid(&verified.id), "Email verified");

    Ok(Json(AuthResponse {
        user: UserResponse::from(verified),
        message: "Email verified successfully".to_string(),
    }))
}

/// Send a fresh verification link, replacing any previous one
#[utoipa::path(
    post,
    path = "/authentication/verify-email/resend",
    tag = "authentication",
    responses(
        (status = 200, description = "Verification email sent", body = AuthSuccessResponse),
        (status = 400, description = "Email already verified"),
        (status = 401, description = "Not authenticated"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn resend_verification(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<AuthSuccessResponse>, Error> {
    if current_user.email_verified {
        return Err(Error::BadRequest {
            message: "Email address is already verified".to_string(),
        });
    }

    let user = state.users.start_verification(current_user.id, &VerificationToken::issue()).await?;
    send_verification(&state, &user);

    Ok(Json(AuthSuccessResponse {
        message: "Verification email sent".to_string(),
    }))
}

/// Change password for the authenticated user
///
/// Every other session of the user is signed out.
#[utoipa::path(
    post,
    path = "/authentication/password-change",
    request_body = ChangePasswordRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Password changed", body = AuthSuccessResponse),
        (status = 400, description = "Invalid new password"),
        (status = 401, description = "Not authenticated or current password incorrect"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    current_user: CurrentUser,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<AuthSuccessResponse>, Error> {
    ensure_native_enabled(&state)?;

    let user = state.users.get_by_id(current_user.id).await?.ok_or_else(|| Error::Unauthenticated {
        message: Some("User not found".to_string()),
    })?;

    let is_valid = password::verify_string_blocking(request.current_password, Some(user.password_hash)).await?;
    if !is_valid {
        return Err(Error::Unauthenticated {
            message: Some("Current password is incorrect".to_string()),
        });
    }

    let new_password_hash = password::hash_string_blocking(request.new_password).await?;
    state.users.update_password(current_user.id, &new_password_hash).await?;

    let keep = session::extract_session_token(&headers, &state.config.auth.native.session.cookie_name).map(session::hash_session_token);
    let revoked = state.sessions.delete_for_user(current_user.id, keep.as_deref()).await?;
    info!(user_id = %abbrev_uuid(&current_user.id), revoked, "Password changed");

    Ok(Json(AuthSuccessResponse {
        message: "Password changed successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::models::auth::{AuthResponse, RegisterRequest};
    use crate::api::models::users::CurrentUser;
    use crate::auth::tokens::VerificationToken;
    use crate::test_utils::{create_test_server, login_cookie, register_user};
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use serde_json::json;

    #[tokio::test]
    async fn test_register_success() {
        let (server, state) = create_test_server();

        let request = RegisterRequest {
            username: "alice".to_string(),
            email: "Alice@Example.com".to_string(),
            password: "secret123".to_string(),
            display_name: Some("Alice".to_string()),
            country_code: "ng".to_string(),
        };
        let response = server.post("/authentication/register").json(&request).await;

        response.assert_status(StatusCode::CREATED);
        // Registration does not sign in
        assert!(response.headers().get("set-cookie").is_none());

        let body: AuthResponse = response.json();
        assert_eq!(body.user.email, "alice@example.com");
        assert_eq!(body.user.country_code, "NG");
        assert!(!body.user.email_verified);

        // Stored verifier is not the plaintext and a token is pending
        let stored = state.users.get_by_username("alice").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "secret123");
        assert!(!stored.password_hash.contains("secret123"));
        assert!(stored.pending_verification().is_some());
    }

    #[tokio::test]
    async fn test_register_disabled() {
        let (server, _) = crate::test_utils::create_test_server_with(|config| config.auth.native.allow_registration = false);

        let response = server
            .post("/authentication/register")
            .json(&json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "secret123",
                "country_code": "NG"
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let info = server.get("/authentication/register").await;
        info.assert_status_ok();
        assert_eq!(info.json::<serde_json::Value>()["enabled"], false);
    }

    #[tokio::test]
    async fn test_register_validation_runs_before_side_effects() {
        let (server, state) = create_test_server();

        let response = server
            .post("/authentication/register")
            .json(&json!({
                "username": "alice",
                "email": "not-an-email",
                "password": "secret123",
                "country_code": "NG"
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.text(), "Invalid email address");
        assert!(state.users.get_by_username("alice").await.unwrap().is_none());

        let response = server
            .post("/authentication/register")
            .json(&json!({"username": "alice"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_register_duplicate_username_conflicts() {
        let (server, _) = create_test_server();
        register_user(&server, "alice", "secret123").await;

        let response = server
            .post("/authentication/register")
            .json(&json!({
                "username": "alice",
                "email": "another@example.com",
                "password": "secret123",
                "country_code": "NG"
            }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "This username is already taken");
    }

    #[tokio::test]
    async fn test_login_success_and_failures_are_indistinguishable() {
        let (server, _) = create_test_server();
        register_user(&server, "alice", "secret123").await;

        let ok = server
            .post("/authentication/login")
            .json(&json!({"username": "alice", "password": "secret123"}))
            .await;
        ok.assert_status_ok();
        let cookie = ok.headers().get("set-cookie").unwrap().to_str().unwrap();
        assert!(cookie.starts_with("codemart_session="));
        assert!(cookie.contains("HttpOnly"));

        let wrong_password = server
            .post("/authentication/login")
            .json(&json!({"username": "alice", "password": "wrong"}))
            .await;
        let unknown_user = server
            .post("/authentication/login")
            .json(&json!({"username": "nobody", "password": "wrong"}))
            .await;

        wrong_password.assert_status(StatusCode::UNAUTHORIZED);
        unknown_user.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password.text(), "Invalid username or password");
        assert_eq!(wrong_password.text(), unknown_user.text());
        assert!(wrong_password.headers().get("set-cookie").is_none());
    }

    #[tokio::test]
    async fn test_login_with_email_handle() {
        let (server, _) = create_test_server();
        register_user(&server, "alice", "secret123").await;

        let ok = server
            .post("/authentication/login")
            .json(&json!({"username": " Alice@Example.com ", "password": "secret123"}))
            .await;
        ok.assert_status_ok();
        assert_eq!(ok.json::<serde_json::Value>()["user"]["username"], "alice");

        let unknown_email = server
            .post("/authentication/login")
            .json(&json!({"username": "nobody@example.com", "password": "secret123"}))
            .await;
        unknown_email.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_email.text(), "Invalid username or password");
    }

    #[tokio::test]
    async fn test_session_and_logout() {
        let (server, _) = create_test_server();
        register_user(&server, "alice", "secret123").await;
        let cookie = login_cookie(&server, "alice", "secret123").await;

        let session = server.get("/authentication/session").add_header("cookie", &cookie).await;
        session.assert_status_ok();
        assert_eq!(session.json::<CurrentUser>().username, "alice");

        let logout = server.post("/authentication/logout").add_header("cookie", &cookie).await;
        logout.assert_status_ok();
        let cleared = logout.headers().get("set-cookie").unwrap().to_str().unwrap();
        assert!(cleared.contains("Max-Age=0"));

        // The old cookie no longer authenticates
        let after = server.get("/authentication/session").add_header("cookie", &cookie).await;
        after.assert_status(StatusCode::UNAUTHORIZED);

        // Logging out without a session is still fine
        server.post("/authentication/logout").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_verify_email_flow() {
        let (server, state) = create_test_server();
        register_user(&server, "alice", "secret123").await;
        let token = state
            .users
            .get_by_username("alice")
            .await
            .unwrap()
            .unwrap()
            .verification_token
            .unwrap();

        let response = server.get("/authentication/verify-email").add_query_param("token", &token).await;
        response.assert_status_ok();
        let body: AuthResponse = response.json();
        assert!(body.user.email_verified);

        let stored = state.users.get_by_username("alice").await.unwrap().unwrap();
        assert!(stored.verification_token.is_none());
        assert!(stored.verification_token_expires_at.is_none());

        // Tokens are single use
        let again = server.get("/authentication/verify-email").add_query_param("token", &token).await;
        again.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_verify_email_unknown_and_expired_tokens() {
        let (server, state) = create_test_server();
        register_user(&server, "alice", "secret123").await;
        let user = state.users.get_by_username("alice").await.unwrap().unwrap();

        let unknown = server.get("/authentication/verify-email").add_query_param("token", "f00d").await;
        unknown.assert_status(StatusCode::NOT_FOUND);

        let expired = VerificationToken::issue_at(Utc::now() - Duration::hours(25));
        state.users.start_verification(user.id, &expired).await.unwrap();

        let response = server
            .get("/authentication/verify-email")
            .add_query_param("token", &expired.token)
            .await;
        response.assert_status(StatusCode::GONE);

        let stored = state.users.get_by_id(user.id).await.unwrap().unwrap();
        assert!(!stored.email_verified);
    }

    #[tokio::test]
    async fn test_resend_verification() {
        let (server, state) = create_test_server();
        register_user(&server, "alice", "secret123").await;
        let cookie = login_cookie(&server, "alice", "secret123").await;
        let before = state.users.get_by_username("alice").await.unwrap().unwrap().verification_token;

        server.post("/authentication/verify-email/resend").await.assert_status(StatusCode::UNAUTHORIZED);

        let response = server.post("/authentication/verify-email/resend").add_header("cookie", &cookie).await;
        response.assert_status_ok();

        let after = state.users.get_by_username("alice").await.unwrap().unwrap().verification_token;
        assert!(after.is_some());
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn test_resend_rejected_when_already_verified() {
        let (server, state) = create_test_server();
        register_user(&server, "alice", "secret123").await;
        let user = state.users.get_by_username("alice").await.unwrap().unwrap();
        let token = user.verification_token.clone().unwrap();
        state.users.mark_verified(user.id, &token).await.unwrap().unwrap();
        let cookie = login_cookie(&server, "alice", "secret123").await;

        let response = server.post("/authentication/verify-email/resend").add_header("cookie", &cookie).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        // No token was issued
        let stored = state.users.get_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.verification_token.is_none());
        assert!(stored.verification_token_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_change_password() {
        let (server, _) = create_test_server();
        register_user(&server, "alice", "secret123").await;
        let cookie = login_cookie(&server, "alice", "secret123").await;
        let other_cookie = login_cookie(&server, "alice", "secret123").await;

        let wrong = server
            .post("/authentication/password-change")
            .add_header("cookie", &cookie)
            .json(&json!({"current_password": "nope", "new_password": "new-secret-1"}))
            .await;
        wrong.assert_status(StatusCode::UNAUTHORIZED);

        let too_short = server
            .post("/authentication/password-change")
            .add_header("cookie", &cookie)
            .json(&json!({"current_password": "secret123", "new_password": "short"}))
            .await;
        too_short.assert_status(StatusCode::BAD_REQUEST);

        let ok = server
            .post("/authentication/password-change")
            .add_header("cookie", &cookie)
            .json(&json!({"current_password": "secret123", "new_password": "new-secret-1"}))
            .await;
        ok.assert_status_ok();

        // This session survives, the other one is signed out
        server.get("/authentication/session").add_header("cookie", &cookie).await.assert_status_ok();
        server
            .get("/authentication/session")
            .add_header("cookie", &other_cookie)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        login_cookie(&server, "alice", "new-secret-1").await;
        server
            .post("/authentication/login")
            .json(&json!({"username": "alice", "password": "secret123"}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
