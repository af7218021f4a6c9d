use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    api::models::{
        pagination::{Page, Pagination},
        users::UserResponse,
    },
    auth::current_user::AdminUser,
    db::models::users::UserFilter,
    errors::Error,
    types::UserId,
};

/// List all users
#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    tag = "admin",
    params(Pagination),
    responses(
        (status = 200, description = "Page of users", body = Page<UserResponse>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an administrator"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    _: AdminUser,
) -> Result<Json<Page<UserResponse>>, Error> {
    let filter = UserFilter {
        skip: pagination.skip(),
        limit: pagination.limit(),
    };
    let users = state.users.list(&filter).await?;

    Ok(Json(Page {
        data: users.into_iter().map(UserResponse::from).collect(),
        skip: filter.skip,
        limit: filter.limit,
    }))
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/api/v1/admin/users/{id}",
    tag = "admin",
    params(
        ("id" = String, Path, description = "User ID (UUID)"),
    ),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "User not found"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<UserId>, _: AdminUser) -> Result<Json<UserResponse>, Error> {
    let user = state.users.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    })?;
    Ok(Json(UserResponse::from(user)))
}
