//! API request/response models for users.

use crate::api::validation::{Validate, check_display_name, check_email, check_country_code};
use crate::config::Config;
use crate::db::models::users::UserDBResponse;
use crate::errors::Error;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Profile edits. Omitted fields are left unchanged.
///
/// Changing `email` marks the account unverified and sends a fresh verification link.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    /// ISO 3166-1 alpha-2 code
    pub country_code: Option<String>,
    pub email: Option<String>,
    /// Free-form payout details, stored as given
    #[schema(value_type = Option<Object>)]
    pub bank_details: Option<serde_json::Value>,
}

impl Validate for UserUpdate {
    fn validate(&self, _config: &Config) -> Result<(), Error> {
        if let Some(display_name) = &self.display_name {
            check_display_name(display_name)?;
        }
        if let Some(country_code) = &self.country_code {
            check_country_code(country_code)?;
        }
        if let Some(email) = &self.email {
            check_email(email)?;
        }
        if let Some(bank_details) = &self.bank_details
            && !bank_details.is_object()
        {
            return Err(Error::BadRequest {
                message: "bank_details must be a JSON object".to_string(),
            });
        }
        Ok(())
    }
}

// User response models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub country_code: String,
    pub is_admin: bool,
    pub email_verified: bool,
    #[schema(value_type = Option<Object>)]
    pub bank_details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The identity attached to an authenticated request. Never carries the verifier.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub country_code: String,
    pub is_admin: bool,
    pub email_verified: bool,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            email: db.email,
            display_name: db.display_name,
            country_code: db.country_code,
            is_admin: db.is_admin,
            email_verified: db.email_verified,
            bank_details: db.bank_details,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<UserDBResponse> for CurrentUser {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            email: db.email,
            display_name: db.display_name,
            country_code: db.country_code,
            is_admin: db.is_admin,
            email_verified: db.email_verified,
        }
    }
}
