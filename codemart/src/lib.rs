//! # codemart: accounts and access control for the Codemart marketplace
//!
//! `codemart` is the identity service behind a marketplace where tipsters sell betting codes.
//! It owns everything about *who* is calling: account registration, credential checks, email
//! verification, login sessions and the two authorization gates the rest of the marketplace
//! builds on.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer.
//! Persistence goes through two storage traits, [`db::handlers::IdentityStore`] and
//! [`db::handlers::SessionStore`], implemented for PostgreSQL (production) and for in-process
//! maps (development and tests). The backend is picked once at startup from `database.type`.
//!
//! ### Request Flow
//!
//! Public routes (`/authentication/register`, `/authentication/login`,
//! `/authentication/verify-email`) run without any caller identity. Every other handler takes
//! one of the extractors from [`auth::current_user`]: `CurrentUser` resolves the session cookie
//! to a live identity or rejects with `401`, and `AdminUser` additionally requires the
//! administrator flag or rejects with `403`. The identity is re-read on every request, so a
//! change to the flag applies immediately.
//!
//! ### Core Components
//!
//! - **API layer** ([`api`]): handlers, request/response models and body validation
//! - **Authentication layer** ([`auth`]): Argon2id verifiers, verification tokens, sessions
//! - **Database layer** ([`db`]): the storage traits and their implementations
//! - **Background services**: a periodic purge of expired sessions
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use codemart::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = codemart::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     codemart::telemetry::init_telemetry(config.log_format)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test_utils;

use crate::{
    api::handlers::{admin, auth as auth_handlers, users as user_handlers},
    auth::{password, utils::normalize_email},
    config::CorsOrigin,
    db::{
        handlers::{IdentityStore, SessionStore},
        models::users::UserCreateDBRequest,
    },
    email::EmailService,
    errors::Error,
    openapi::ApiDoc,
};
use axum::{
    Router,
    http::{self, HeaderValue},
    routing::{get, post},
};
use bon::Builder;
use chrono::Utc;
pub use config::Config;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::UserId;

/// Country recorded for the bootstrap administrator, which has no real-world residence.
const ADMIN_COUNTRY_CODE: &str = "ZZ";

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let stores = Stores::in_memory();
/// let state = AppState::builder()
///     .config(config)
///     .users(stores.users)
///     .sessions(stores.sessions)
///     .email(Arc::new(EmailService::new(&config)?))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn IdentityStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub email: Arc<EmailService>,
}

/// Get the codemart database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user if it doesn't exist.
///
/// Runs only when `admin_password` is configured. The account is created verified and with the
/// administrator flag; on later starts the password is reset to the configured one and the flag
/// is restored if it was removed. Returns the administrator's ID, or `None` when skipped.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(config: &Config, users: &dyn IdentityStore) -> Result<Option<UserId>, Error> {
    let Some(admin_password) = config.admin_password.as_deref() else {
        debug!("No admin password configured, skipping initial admin user");
        return Ok(None);
    };

    let password_hash = password::hash_string_blocking(admin_password.to_string()).await?;

    if let Some(existing) = users.get_by_username(&config.admin_username).await? {
        users.update_password(existing.id, &password_hash).await?;
        if !existing.is_admin {
            users.set_admin(existing.id, true).await?;
        }
        debug!(username = %config.admin_username, "Initial admin user already exists");
        return Ok(Some(existing.id));
    }

    let created = users
        .create(&UserCreateDBRequest {
            username: config.admin_username.clone(),
            email: normalize_email(&config.admin_email),
            password_hash,
            display_name: None,
            country_code: ADMIN_COUNTRY_CODE.to_string(),
            is_admin: true,
            email_verified: true,
            verification: None,
        })
        .await?;

    info!(username = %created.username, "Created initial admin user");
    Ok(Some(created.id))
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allowed = &config.auth.security.cors.allowed_origins;

    let allow_origin = if allowed.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in allowed {
            if let CorsOrigin::Url(url) = origin {
                // Browsers send the bare origin, without the trailing slash `Url` adds
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::PATCH])
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_credentials(config.auth.security.cors.allow_credentials);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router with all endpoints and middleware.
///
/// - `/healthz`: liveness
/// - `/authentication/*`: registration, login, sessions and email verification
/// - `/api/v1/*`: profile and administrator routes
/// - `/docs`: API reference
///
/// # Errors
///
/// Returns an error if the CORS configuration is invalid.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let auth_routes = Router::new()
        .route(
            "/authentication/register",
            get(auth_handlers::get_registration_info).post(auth_handlers::register),
        )
        .route("/authentication/login", get(auth_handlers::get_login_info).post(auth_handlers::login))
        .route("/authentication/logout", post(auth_handlers::logout))
        .route("/authentication/session", get(auth_handlers::get_session))
        .route("/authentication/verify-email", get(auth_handlers::verify_email))
        .route("/authentication/verify-email/resend", post(auth_handlers::resend_verification))
        .route("/authentication/password-change", post(auth_handlers::change_password))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route(
            "/users/current",
            get(user_handlers::get_current_user).patch(user_handlers::update_current_user),
        )
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{id}", get(admin::get_user))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .merge(auth_routes)
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;

    let router = router.layer(cors_layer).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Periodically delete sessions whose expiry has passed until `shutdown` fires.
fn spawn_session_purge(sessions: Arc<dyn SessionStore>, every: Duration, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Session purge task stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match sessions.purge_expired(Utc::now()).await {
                        Ok(0) => {}
                        Ok(purged) => info!(purged, "Purged expired sessions"),
                        Err(e) => warn!(error = %e, "Failed to purge expired sessions"),
                    }
                }
            }
        }
    })
}

/// Container for background services and their lifecycle management.
///
/// When dropped, the `drop_guard` cancels the shutdown token so no task outlives the
/// application.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<tokio_util::sync::DropGuard>,
}

impl BackgroundServices {
    fn start(state: &AppState, shutdown_token: CancellationToken) -> Self {
        let drop_guard = shutdown_token.clone().drop_guard();
        let background_tasks = vec![spawn_session_purge(
            state.sessions.clone(),
            state.config.session_cleanup_interval,
            shutdown_token.clone(),
        )];

        Self {
            background_tasks,
            shutdown_token,
            drop_guard: Some(drop_guard),
        }
    }

    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();

        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] connects the storage backend, runs migrations, ensures
///    the initial administrator and starts background services
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: when the shutdown future resolves, in-flight requests drain and background
///    tasks stop
pub struct Application {
    router: Router,
    config: Config,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting codemart with configuration: {:#?}", config.redacted());

        let stores = db::setup_stores(&config.database).await?;

        create_initial_admin_user(&config, stores.users.as_ref())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {}", e))?;

        let email = Arc::new(EmailService::new(&config)?);

        let app_state = AppState::builder()
            .config(config.clone())
            .users(stores.users)
            .sessions(stores.sessions)
            .email(email)
            .build();

        let bg_services = BackgroundServices::start(&app_state, CancellationToken::new());
        let router = build_router(&app_state)?;

        Ok(Self {
            router,
            config,
            bg_services,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Codemart listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Stopping background services...");
        self.bg_services.shutdown().await;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Application, create_initial_admin_user};
    use crate::auth::password;
    use crate::db::in_memory::InMemoryUsers;
    use crate::db::handlers::IdentityStore;
    use crate::test_utils::create_test_config;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_initial_admin_user_is_idempotent() {
        let users = InMemoryUsers::new();
        let mut config = create_test_config();

        // Skipped without a password
        assert_eq!(create_initial_admin_user(&config, &users).await.unwrap(), None);
        assert!(users.get_by_username("admin").await.unwrap().is_none());

        config.admin_password = Some("first-password".to_string());
        let id = create_initial_admin_user(&config, &users).await.unwrap().unwrap();

        let admin = users.get_by_id(id).await.unwrap().unwrap();
        assert!(admin.is_admin);
        assert!(admin.email_verified);
        assert_eq!(admin.country_code, "ZZ");
        assert!(password::verify_string("first-password", &admin.password_hash));

        // A second start with a new password keeps the account and updates the verifier
        users.set_admin(id, false).await.unwrap();
        config.admin_password = Some("second-password".to_string());
        let again = create_initial_admin_user(&config, &users).await.unwrap().unwrap();
        assert_eq!(again, id);

        let admin = users.get_by_id(id).await.unwrap().unwrap();
        assert!(admin.is_admin);
        assert!(password::verify_string("second-password", &admin.password_hash));
        assert!(!password::verify_string("first-password", &admin.password_hash));
    }

    #[test_log::test(tokio::test)]
    async fn test_application_serves_health_docs_and_admin_login() {
        let mut config = create_test_config();
        config.admin_password = Some("admin-password".to_string());

        let app = Application::new(config).await.unwrap();
        let (server, _bg_services) = app.into_test_server();

        let health = server.get("/healthz").await;
        health.assert_status_ok();
        assert_eq!(health.text(), "OK");

        server.get("/docs").await.assert_status_ok();

        let login = server
            .post("/authentication/login")
            .json(&json!({"username": "admin", "password": "admin-password"}))
            .await;
        login.assert_status_ok();
        let cookie = login.headers().get("set-cookie").unwrap().to_str().unwrap();
        let cookie = cookie.split(';').next().unwrap().to_string();

        server
            .get("/api/v1/admin/users")
            .add_header("cookie", &cookie)
            .await
            .assert_status(StatusCode::OK);
    }

    #[tokio::test]
    async fn test_background_services_shutdown() {
        let app = Application::new(create_test_config()).await.unwrap();
        let (_server, bg_services) = app.into_test_server();
        tokio::time::timeout(std::time::Duration::from_secs(5), bg_services.shutdown())
            .await
            .expect("background tasks stop on shutdown");
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_configured_origin() {
        let app = Application::new(create_test_config()).await.unwrap();
        let (server, _bg_services) = app.into_test_server();

        let response = server
            .method(axum::http::Method::OPTIONS, "/authentication/login")
            .add_header("origin", "http://localhost:5173")
            .add_header("access-control-request-method", "POST")
            .await;

        let allowed = response.headers().get("access-control-allow-origin").unwrap();
        assert_eq!(allowed, "http://localhost:5173");
    }
}
