use crate::{
    auth::AuthError,
    handlers::AppState,
    services::users::{LoginRequest, LoginResponse},
};
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use tracing::info;

/// Exchange email and password for a bearer token
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let response = state.services.users.login(payload).await?;
    info!(user_id = %response.user.id, "User logged in");
    Ok(Json(response))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}
