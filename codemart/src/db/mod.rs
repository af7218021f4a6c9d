//! Data-access layer for identities and sessions.
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers)
//! └──────┬──────┘
//!        │  Arc<dyn IdentityStore>, Arc<dyn SessionStore>
//!        ↓
//! ┌─────────────┐
//! │   Stores    │  (db::handlers for PostgreSQL, db::in_memory for development/tests)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: storage traits and their PostgreSQL implementations
//! - [`in_memory`]: in-process implementations of the same traits
//! - [`models`]: database record structures matching table schemas
//! - [`errors`]: database-specific error types
//!
//! # Migrations
//!
//! Migrations live in the `migrations/` directory and are applied at startup through
//! [`crate::migrator`]:
//!
//! ```ignore
//! codemart::migrator().run(&pool).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::config::{DatabaseConfig, PoolSettings};

pub mod errors;
pub mod handlers;
pub mod in_memory;
pub mod models;


use handlers::{IdentityStore, SessionStore, Sessions, Users};
use in_memory::{InMemorySessions, InMemoryUsers};

/// Store handles shared by every request.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn IdentityStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUsers::new()),
            sessions: Arc::new(InMemorySessions::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(Users::new(pool.clone())),
            sessions: Arc::new(Sessions::new(pool)),
        }
    }
}

/// Open a connection pool with the configured limits.
pub async fn connect_pool(url: &str, settings: &PoolSettings) -> Result<PgPool, sqlx::Error> {
    let mut options = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs));

    if settings.idle_timeout_secs > 0 {
        options = options.idle_timeout(Duration::from_secs(settings.idle_timeout_secs));
    }

    options.connect(url).await
}

/// Build the stores for the configured backend, running migrations on PostgreSQL.
pub async fn setup_stores(config: &DatabaseConfig) -> anyhow::Result<Stores> {
    match config {
        DatabaseConfig::Memory => {
            tracing::warn!("Using in-memory storage: all accounts and sessions are lost on shutdown");
            Ok(Stores::in_memory())
        }
        DatabaseConfig::External { url, pool } => {
            tracing::info!("Using external database");
            let pool = connect_pool(url, pool).await?;
            crate::migrator().run(&pool).await?;
            Ok(Stores::postgres(pool))
        }
    }
}
