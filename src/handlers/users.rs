use super::common::{
    created_response, map_service_error, no_content_response, success_response, MessageResponse,
};
use crate::{
    auth::AuthUser,
    errors::ApiError,
    handlers::AppState,
    services::users::{ChangePasswordInput, CreateUserInput, UpdateProfileInput, UpdateUserInput},
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tracing::info;
use uuid::Uuid;

/// List all users (admin only)
#[utoipa::path(
    get,
    path = "/api/v1/users",
    responses(
        (status = 200, description = "Users by name", body = [crate::entities::user::Model]),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .services
        .users
        .list_users(&user.actor())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(users))
}

/// Create a user (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body(
        content = CreateUserInput,
        example = json!({
            "name": "Ana Souza",
            "email": "ana.souza@example.com",
            "password": "correct-horse-battery",
            "role": "requester",
            "sector_id": "5b3f6c1e-8a2d-4f4e-9c1a-2d7e8f9a0b1c"
        })
    ),
    responses(
        (status = 201, description = "User created", body = crate::entities::user::Model),
        (status = 400, description = "Invalid input or unknown sector", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateUserInput>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state
        .services
        .users
        .create_user(&user.actor(), payload)
        .await
        .map_err(map_service_error)?;

    info!(user_id = %created.id, "User created");
    Ok(created_response(created))
}

/// Get a user (self or admin)
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = crate::entities::user::Model),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let found = state
        .services
        .users
        .get_user(&user.actor(), id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(found))
}

/// Update a user (admin only)
#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserInput,
    responses(
        (status = 200, description = "User updated", body = crate::entities::user::Model),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email taken or last administrator", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserInput>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .services
        .users
        .update_user(&user.actor(), id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(updated))
}

/// Delete a user (admin only)
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "User has open requests or is the last administrator", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .users
        .delete_user(&user.actor(), id)
        .await
        .map_err(map_service_error)?;

    info!(user_id = %id, "User deleted");
    Ok(no_content_response())
}

/// Grant the administrator role
#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/promote",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User promoted", body = crate::entities::user::Model),
        (status = 409, description = "Already an administrator", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn promote_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let promoted = state
        .services
        .users
        .promote_to_admin(&user.actor(), id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(promoted))
}

/// The caller's own account
#[utoipa::path(
    get,
    path = "/api/v1/profile",
    responses((status = 200, description = "Profile", body = crate::entities::user::Model)),
    security(("bearer_auth" = [])),
    tag = "profile"
)]
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .services
        .users
        .get_profile(&user.actor())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(profile))
}

#[utoipa::path(
    patch,
    path = "/api/v1/profile",
    request_body = UpdateProfileInput,
    responses((status = 200, description = "Profile updated", body = crate::entities::user::Model)),
    security(("bearer_auth" = [])),
    tag = "profile"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateProfileInput>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .services
        .users
        .update_profile(&user.actor(), payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(profile))
}

#[utoipa::path(
    post,
    path = "/api/v1/profile/password",
    request_body = ChangePasswordInput,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Wrong current password or weak new password", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "profile"
)]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ChangePasswordInput>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .users
        .change_password(&user.actor(), payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(MessageResponse::new("Password changed")))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).patch(update_user).delete(delete_user))
        .route("/:id/promote", post(promote_user))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_profile).patch(update_profile))
        .route("/password", post(change_password))
}
