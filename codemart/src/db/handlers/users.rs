//! Database repository for users.

use crate::auth::tokens::VerificationToken;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::IdentityStore,
    models::users::{UserCreateDBRequest, UserDBResponse, UserFilter, UserUpdateDBRequest},
};
use crate::types::{UserId, abbrev_uuid};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

/// PostgreSQL-backed [`IdentityStore`].
#[derive(Clone)]
pub struct Users {
    pool: PgPool,
}

impl Users {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl IdentityStore for Users {
    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let (token, expires_at) = match &request.verification {
            Some(v) => (Some(v.token.as_str()), Some(v.expires_at)),
            None => (None, None),
        };

        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            INSERT INTO users (
                id, username, email, password_hash, display_name, country_code,
                is_admin, email_verified, verification_token, verification_token_expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.username)
        .bind(&request.email)
        .bind(&request.password_hash)
        .bind(&request.display_name)
        .bind(&request.country_code)
        .bind(request.is_admin)
        .bind(request.email_verified)
        .bind(token)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self), err)]
    async fn get_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self, email), err)]
    async fn get_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self, token), err)]
    async fn get_by_verification_token(&self, token: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE verification_token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&self, filter: &UserFilter) -> Result<Vec<UserDBResponse>> {
        let users = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users ORDER BY created_at ASC, id ASC LIMIT $1 OFFSET $2")
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            UPDATE users SET
                display_name = COALESCE($2, display_name),
                country_code = COALESCE($3, country_code),
                bank_details = COALESCE($4, bank_details),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.display_name)
        .bind(&request.country_code)
        .bind(&request.bank_details)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(user)
    }

    #[instrument(skip(self, email, verification), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn change_email(&self, id: UserId, email: &str, verification: &VerificationToken) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            UPDATE users SET
                email = $2,
                email_verified = FALSE,
                verification_token = $3,
                verification_token_expires_at = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(&verification.token)
        .bind(verification.expires_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(user)
    }

    #[instrument(skip(self, password_hash), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self, verification), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn start_verification(&self, id: UserId, verification: &VerificationToken) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            UPDATE users SET
                verification_token = $2,
                verification_token_expires_at = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&verification.token)
        .bind(verification.expires_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(user)
    }

    #[instrument(skip(self, token), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn mark_verified(&self, id: UserId, token: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            UPDATE users SET
                email_verified = TRUE,
                verification_token = NULL,
                verification_token_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND verification_token = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, UserDBResponse>("UPDATE users SET is_admin = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(is_admin)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DbError::NotFound)?;

        Ok(user)
    }
}
