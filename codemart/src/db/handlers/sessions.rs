//! Database repository for login sessions.

use crate::db::{errors::Result, handlers::repository::SessionStore, models::sessions::SessionRecord};
use crate::types::{UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

/// PostgreSQL-backed [`SessionStore`].
#[derive(Clone)]
pub struct Sessions {
    pool: PgPool,
}

impl Sessions {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionStore for Sessions {
    #[instrument(skip(self, id), fields(user_id = %abbrev_uuid(&user_id)), err)]
    async fn create(&self, id: &str, user_id: UserId, expires_at: DateTime<Utc>) -> Result<SessionRecord> {
        let session = sqlx::query_as::<_, SessionRecord>(
            r#"
            INSERT INTO sessions (id, user_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, created_at, expires_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    #[instrument(skip(self, id), err)]
    async fn get_live(&self, id: &str, now: DateTime<Utc>) -> Result<Option<SessionRecord>> {
        let session = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = $1 AND expires_at > $2",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    #[instrument(skip(self, id), err)]
    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1").bind(id).execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, keep), fields(user_id = %abbrev_uuid(&user_id)), err)]
    async fn delete_for_user(&self, user_id: UserId, keep: Option<&str>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND ($2::TEXT IS NULL OR id <> $2)")
            .bind(user_id)
            .bind(keep)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
