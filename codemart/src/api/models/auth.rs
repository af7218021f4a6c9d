//! API request/response models for authentication.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::models::users::UserResponse;
use crate::api::validation::{Validate, check_country_code, check_display_name, check_email, check_password, check_username};
use crate::config::Config;
use crate::errors::Error;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    /// ISO 3166-1 alpha-2 code
    pub country_code: String,
}

impl Validate for RegisterRequest {
    fn validate(&self, config: &Config) -> Result<(), Error> {
        check_username(&self.username)?;
        check_email(&self.email)?;
        check_password(&self.password, config)?;
        if let Some(display_name) = &self.display_name {
            check_display_name(display_name)?;
        }
        check_country_code(&self.country_code)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self, _config: &Config) -> Result<(), Error> {
        // Shape only: credential rules are not revealed to anonymous callers
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(Error::BadRequest {
                message: "Username and password are required".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

impl Validate for ChangePasswordRequest {
    fn validate(&self, config: &Config) -> Result<(), Error> {
        if self.current_password.is_empty() {
            return Err(Error::BadRequest {
                message: "Current password is required".to_string(),
            });
        }
        check_password(&self.new_password, config)
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct VerifyEmailQuery {
    /// Token from the verification link
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthSuccessResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegistrationInfo {
    pub enabled: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginInfo {
    pub enabled: bool,
    pub message: String,
}

/// `201 Created`. Registration never signs the new account in.
pub struct RegisterResponse {
    pub auth_response: AuthResponse,
}

impl IntoResponse for RegisterResponse {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.auth_response)).into_response()
    }
}

/// `200 OK` with the session cookie set.
pub struct LoginResponse {
    pub auth_response: AuthResponse,
    pub cookie: String,
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, [(header::SET_COOKIE, self.cookie)], Json(self.auth_response)).into_response()
    }
}

/// `200 OK` with the session cookie cleared.
pub struct LogoutResponse {
    pub auth_response: AuthSuccessResponse,
    pub cookie: String,
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, [(header::SET_COOKIE, self.cookie)], Json(self.auth_response)).into_response()
    }
}
