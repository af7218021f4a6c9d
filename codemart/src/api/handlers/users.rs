use axum::{Json, extract::State};
use tracing::info;

use crate::{
    AppState,
    api::{
        handlers::auth::send_verification,
        models::users::{CurrentUser, UserResponse, UserUpdate},
        validation::ValidatedJson,
    },
    auth::{
        tokens::VerificationToken,
        utils::{normalize_country_code, normalize_email},
    },
    db::models::users::UserUpdateDBRequest,
    errors::Error,
    types::abbrev_uuid,
};

fn current_not_found(current_user: &CurrentUser) -> Error {
    Error::NotFound {
        resource: "User".to_string(),
        id: current_user.id.to_string(),
    }
}

/// Get the signed-in user's profile
#[utoipa::path(
    get,
    path = "/api/v1/users/current",
    tag = "users",
    responses(
        (status = 200, description = "Current user profile", body = UserResponse),
        (status = 401, description = "Not authenticated"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_current_user(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>, Error> {
    let user = state
        .users
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| current_not_found(&current_user))?;
    Ok(Json(UserResponse::from(user)))
}

/// Update the signed-in user's profile
///
/// A new email address takes effect immediately, marks the account unverified and sends a
/// verification link to the new address.
#[utoipa::path(
    patch,
    path = "/api/v1/users/current",
    request_body = UserUpdate,
    tag = "users",
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "Email already in use"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_current_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ValidatedJson(update): ValidatedJson<UserUpdate>,
) -> Result<Json<UserResponse>, Error> {
    if let Some(email) = update.email.as_deref().map(normalize_email)
        && email != current_user.email
    {
        let user = state
            .users
            .change_email(current_user.id, &email, &VerificationToken::issue())
            .await?;
        info!(user_id = %abbrev_uuid(&user.id), "Email address changed, verification required");
        send_verification(&state, &user);
    }

    let db_request = UserUpdateDBRequest {
        display_name: update.display_name.map(|name| name.trim().to_string()),
        country_code: update.country_code.as_deref().and_then(normalize_country_code),
        bank_details: update.bank_details,
    };

    let user = state.users.update(current_user.id, &db_request).await?;
    Ok(Json(UserResponse::from(user)))
}
