use super::common::{created_response, map_service_error, no_content_response, success_response};
use crate::{
    auth::AuthUser,
    errors::ApiError,
    handlers::AppState,
    services::budgets::{CreateBudgetInput, UpdateBudgetInput},
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use uuid::Uuid;

/// Record a supplier quote for an item
#[utoipa::path(
    post,
    path = "/api/v1/requests/{id}/items/{item_id}/budgets",
    params(
        ("id" = Uuid, Path, description = "Purchase request ID"),
        ("item_id" = Uuid, Path, description = "Item ID")
    ),
    request_body = CreateBudgetInput,
    responses(
        (status = 201, description = "Budget created", body = crate::entities::item_budget::Model),
        (status = 400, description = "Unknown supplier or non-positive price", body = crate::errors::ErrorResponse),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not on this request", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "budgets"
)]
pub async fn create_budget(
    State(state): State<AppState>,
    user: AuthUser,
    Path((request_id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CreateBudgetInput>,
) -> Result<impl IntoResponse, ApiError> {
    let budget = state
        .services
        .budgets
        .create_budget(&user.actor(), request_id, item_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(budget))
}

/// Budgets of every item of a request
#[utoipa::path(
    get,
    path = "/api/v1/requests/{id}/budgets",
    params(("id" = Uuid, Path, description = "Purchase request ID")),
    responses(
        (status = 200, description = "Budgets", body = [crate::entities::item_budget::Model]),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "budgets"
)]
pub async fn list_request_budgets(
    State(state): State<AppState>,
    user: AuthUser,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let budgets = state
        .services
        .budgets
        .list_request_budgets(&user.actor(), request_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(budgets))
}

/// Change the quoted unit price
#[utoipa::path(
    patch,
    path = "/api/v1/budgets/{budget_id}",
    params(("budget_id" = Uuid, Path, description = "Budget ID")),
    request_body = UpdateBudgetInput,
    responses(
        (status = 200, description = "Budget updated", body = crate::entities::item_budget::Model),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "budgets"
)]
pub async fn update_budget(
    State(state): State<AppState>,
    user: AuthUser,
    Path(budget_id): Path<Uuid>,
    Json(payload): Json<UpdateBudgetInput>,
) -> Result<impl IntoResponse, ApiError> {
    let budget = state
        .services
        .budgets
        .update_budget(&user.actor(), budget_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(budget))
}

#[utoipa::path(
    delete,
    path = "/api/v1/budgets/{budget_id}",
    params(("budget_id" = Uuid, Path, description = "Budget ID")),
    responses(
        (status = 204, description = "Budget deleted"),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "budgets"
)]
pub async fn delete_budget(
    State(state): State<AppState>,
    user: AuthUser,
    Path(budget_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .budgets
        .delete_budget(&user.actor(), budget_id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

/// Budget routes that hang off a request, nested under `/requests`
pub fn request_budget_routes() -> Router<AppState> {
    Router::new()
        .route("/:id/items/:item_id/budgets", post(create_budget))
        .route("/:id/budgets", get(list_request_budgets))
}

/// Budget routes addressed by budget id, nested under `/budgets`
pub fn budget_routes() -> Router<AppState> {
    Router::new().route("/:budget_id", patch(update_budget).delete(delete_budget))
}
