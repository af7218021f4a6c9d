//! Test utilities shared by the handler and extractor tests.

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;

use crate::{
    AppState, build_router,
    api::models::auth::AuthResponse,
    config::{Config, DatabaseConfig, EmailTransportConfig},
    db::Stores,
    email::EmailService,
};

/// In-memory storage, mails logged instead of sent, plain-HTTP cookies.
pub fn create_test_config() -> Config {
    let mut config = Config {
        database: DatabaseConfig::Memory,
        ..Default::default()
    };
    config.email.transport = EmailTransportConfig::Log;
    config.auth.native.session.cookie_secure = false;
    config
}

fn create_state(config: Config) -> AppState {
    let stores = Stores::in_memory();
    let email = Arc::new(EmailService::new(&config).expect("Failed to create email service"));

    AppState::builder()
        .config(config)
        .users(stores.users)
        .sessions(stores.sessions)
        .email(email)
        .build()
}

pub fn create_test_state() -> AppState {
    create_state(create_test_config())
}

pub fn create_test_server() -> (TestServer, AppState) {
    create_test_server_with(|_| {})
}

/// Like [`create_test_server`] with a tweak applied to the test config first.
pub fn create_test_server_with(configure: impl FnOnce(&mut Config)) -> (TestServer, AppState) {
    let mut config = create_test_config();
    configure(&mut config);

    let state = create_state(config);
    let router = build_router(&state).expect("Failed to build router");
    let server = TestServer::new(router.into_make_service()).expect("Failed to create test server");
    (server, state)
}

/// Register `username` with `{username}@example.com` and country `NG`.
pub async fn register_user(server: &TestServer, username: &str, password: &str) -> AuthResponse {
    let response = server
        .post("/authentication/register")
        .json(&json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": password,
            "country_code": "NG"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

/// Log in and return the `name=value` pair to send back in a `Cookie` header.
pub async fn login_cookie(server: &TestServer, username: &str, password: &str) -> String {
    let response = server
        .post("/authentication/login")
        .json(&json!({"username": username, "password": password}))
        .await;
    response.assert_status_ok();

    let set_cookie = response
        .headers()
        .get("set-cookie")
        .expect("login sets a cookie")
        .to_str()
        .unwrap()
        .to_string();
    set_cookie.split(';').next().unwrap().to_string()
}
