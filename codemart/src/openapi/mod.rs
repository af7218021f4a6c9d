//! OpenAPI documentation for the HTTP API.
//!
//! [`ApiDoc`] collects every handler annotated with `#[utoipa::path]` and is rendered with
//! Scalar at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;
use crate::api::models::{auth, pagination, users};

/// Security scheme for the session cookie set by `/authentication/login`.
struct SessionSecurityAddon;

impl Modify for SessionSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "session_token".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "codemart_session",
                    "Session cookie issued by `POST /authentication/login`. \
                     The cookie name follows `auth.native.session.cookie_name`.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Codemart API",
        description = "Accounts, sessions and access control for the Codemart marketplace."
    ),
    modifiers(&SessionSecurityAddon),
    paths(
        api::handlers::auth::get_registration_info,
        api::handlers::auth::register,
        api::handlers::auth::get_login_info,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::get_session,
        api::handlers::auth::verify_email,
        api::handlers::auth::resend_verification,
        api::handlers::auth::change_password,
        api::handlers::users::get_current_user,
        api::handlers::users::update_current_user,
        api::handlers::admin::list_users,
        api::handlers::admin::get_user,
    ),
    components(
        schemas(
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::ChangePasswordRequest,
            auth::AuthResponse,
            auth::AuthSuccessResponse,
            auth::RegistrationInfo,
            auth::LoginInfo,
            users::UserResponse,
            users::UserUpdate,
            users::CurrentUser,
            pagination::Page<users::UserResponse>,
        )
    ),
    tags(
        (name = "authentication", description = "Registration, login, sessions and email verification"),
        (name = "users", description = "The signed-in user's profile"),
        (name = "admin", description = "Administrator-only user management"),
    )
)]
pub struct ApiDoc;
