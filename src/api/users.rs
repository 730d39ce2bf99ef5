//! Borrower endpoints

use axum::{extract::State, http::StatusCode, Json};

use super::{exists_status, ApiJson, ApiPath, ApiQuery};
use crate::{
    error::{AppResult, ErrorResponse},
    models::{
        page::{Page, UserPage},
        user::{User, UserInput, UserQuery},
    },
    AppState,
};

/// List users with keyword search and pagination
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    params(UserQuery),
    responses(
        (status = 200, description = "Page of users", body = UserPage),
        (status = 400, description = "Invalid paging or sort parameters", body = ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> AppResult<Json<Page<User>>> {
    let users = state.services.users.list(&query).await?;
    Ok(Json(users))
}

/// Get user details by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<User>> {
    let user = state.services.users.get(id).await?;
    Ok(Json(user))
}

#[utoipa::path(
    get,
    path = "/users/email/{email}",
    tag = "users",
    params(
        ("email" = String, Path, description = "Email address, case-insensitive")
    ),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
pub async fn get_user_by_email(
    State(state): State<AppState>,
    ApiPath(email): ApiPath<String>,
) -> AppResult<Json<User>> {
    let user = state.services.users.get_by_email(&email).await?;
    Ok(Json(user))
}

#[utoipa::path(
    get,
    path = "/users/count",
    tag = "users",
    responses(
        (status = 200, description = "User count", body = i64)
    )
)]
pub async fn count_users(State(state): State<AppState>) -> AppResult<Json<i64>> {
    let count = state.services.users.count().await?;
    Ok(Json(count))
}

/// 200 when the user exists, 404 otherwise
#[utoipa::path(
    get,
    path = "/users/{id}/exists",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User exists"),
        (status = 404, description = "No such user")
    )
)]
pub async fn user_exists(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    let exists = state.services.users.exists(id).await?;
    Ok(exists_status(exists))
}

/// 200 when an active user holds this email (any case), 404 otherwise
#[utoipa::path(
    get,
    path = "/users/email/{email}/exists",
    tag = "users",
    params(
        ("email" = String, Path, description = "Email address")
    ),
    responses(
        (status = 200, description = "Email is taken"),
        (status = 404, description = "Email is free")
    )
)]
pub async fn email_exists(
    State(state): State<AppState>,
    ApiPath(email): ApiPath<String>,
) -> AppResult<StatusCode> {
    let exists = state.services.users.email_exists(&email).await?;
    Ok(exists_status(exists))
}

/// Create a new user
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = UserInput,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Email already exists", body = ErrorResponse)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(user): ApiJson<UserInput>,
) -> AppResult<(StatusCode, Json<User>)> {
    let created = state.services.users.create(user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update an existing user
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    request_body = UserInput,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Email already exists", body = ErrorResponse)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(user): ApiJson<UserInput>,
) -> AppResult<Json<User>> {
    let updated = state.services.users.update(id, user).await?;
    Ok(Json(updated))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "User has outstanding loans", body = ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    state.services.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
