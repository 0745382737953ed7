use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    auth::AuthUser,
    commands::requests::{
        CompleteRequestCommand, CreatePurchaseRequestCommand, DeletePurchaseRequestCommand,
        NewRequestItem, RemovePriorityCommand, ReopenRequestCommand, ReviewRequestCommand,
        SetPriorityCommand, ToggleUrgentCommand, UpdatePurchaseRequestCommand,
    },
    errors::ApiError,
    handlers::AppState,
    models::{Priority, RequestStatus},
    services::requests::RequestFilter,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// Request bodies

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePurchaseRequestBody {
    #[validate(length(max = 2000))]
    pub observations: Option<String>,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<NewRequestItem>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdatePurchaseRequestBody {
    #[validate(length(max = 2000))]
    pub observations: Option<String>,
    pub status: Option<RequestStatus>,
    #[validate(length(max = 2000))]
    pub admin_notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReviewRequestBody {
    pub status: RequestStatus,
    #[validate(length(max = 2000))]
    pub admin_notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SetPriorityBody {
    pub priority: Priority,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct CompleteRequestBody {
    #[validate(length(max = 2000))]
    pub completion_notes: Option<String>,
}

// Handlers

/// Create a purchase request with its items
#[utoipa::path(
    post,
    path = "/api/v1/requests",
    request_body = CreatePurchaseRequestBody,
    responses(
        (status = 201, description = "Request created", body = crate::commands::requests::CreatePurchaseRequestResult),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "requests"
)]
pub async fn create_request(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePurchaseRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let command = CreatePurchaseRequestCommand {
        actor: user.actor(),
        observations: payload.observations,
        items: payload.items,
    };
    let created = state
        .services
        .requests
        .execute(command)
        .await
        .map_err(map_service_error)?;

    info!(request_id = %created.request.id, "Purchase request created");
    Ok(created_response(created))
}

/// List purchase requests visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/requests",
    params(RequestFilter),
    responses(
        (status = 200, description = "Requests, newest first", body = [crate::services::requests::RequestWithItems]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "requests"
)]
pub async fn list_requests(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<RequestFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let requests = state
        .services
        .requests
        .list_requests(&user.actor(), filter)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(requests))
}

/// Get a purchase request with its items
#[utoipa::path(
    get,
    path = "/api/v1/requests/{id}",
    params(("id" = Uuid, Path, description = "Purchase request ID")),
    responses(
        (status = 200, description = "Request found", body = crate::services::requests::RequestWithItems),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "requests"
)]
pub async fn get_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let request = state
        .services
        .requests
        .get_request(&user.actor(), id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(request))
}

/// Update observations, or status and admin notes as an administrator
#[utoipa::path(
    patch,
    path = "/api/v1/requests/{id}",
    params(("id" = Uuid, Path, description = "Purchase request ID")),
    request_body = UpdatePurchaseRequestBody,
    responses(
        (status = 200, description = "Request updated", body = crate::entities::purchase_request::Model),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Status change on a completed request", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "requests"
)]
pub async fn update_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePurchaseRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let command = UpdatePurchaseRequestCommand {
        actor: user.actor(),
        request_id: id,
        observations: payload.observations,
        status: payload.status,
        admin_notes: payload.admin_notes,
    };
    let request = state
        .services
        .requests
        .execute(command)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(request))
}

/// Soft-delete a purchase request
#[utoipa::path(
    delete,
    path = "/api/v1/requests/{id}",
    params(("id" = Uuid, Path, description = "Purchase request ID")),
    responses(
        (status = 204, description = "Request deleted"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Request already reviewed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "requests"
)]
pub async fn delete_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let command = DeletePurchaseRequestCommand {
        actor: user.actor(),
        request_id: id,
    };
    state
        .services
        .requests
        .execute(command)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

/// Manually set the request status
#[utoipa::path(
    patch,
    path = "/api/v1/requests/{id}/review",
    params(("id" = Uuid, Path, description = "Purchase request ID")),
    request_body = ReviewRequestBody,
    responses(
        (status = 200, description = "Request reviewed", body = crate::entities::purchase_request::Model),
        (status = 400, description = "Status not allowed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse),
        (status = 409, description = "Request is completed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "lifecycle"
)]
pub async fn review_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let command = ReviewRequestCommand {
        actor: user.actor(),
        request_id: id,
        status: payload.status,
        admin_notes: payload.admin_notes,
    };
    let request = state
        .services
        .requests
        .execute(command)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(request))
}

/// Set the request priority
#[utoipa::path(
    patch,
    path = "/api/v1/requests/{id}/priority",
    params(("id" = Uuid, Path, description = "Purchase request ID")),
    request_body = SetPriorityBody,
    responses(
        (status = 200, description = "Priority set", body = crate::entities::purchase_request::Model),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "lifecycle"
)]
pub async fn set_priority(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetPriorityBody>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let command = SetPriorityCommand {
        actor: user.actor(),
        request_id: id,
        priority: payload.priority,
        notes: payload.notes,
    };
    let request = state
        .services
        .requests
        .execute(command)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(request))
}

/// Reset the request priority to normal
#[utoipa::path(
    delete,
    path = "/api/v1/requests/{id}/priority",
    params(("id" = Uuid, Path, description = "Purchase request ID")),
    responses(
        (status = 200, description = "Priority removed", body = crate::entities::purchase_request::Model),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "lifecycle"
)]
pub async fn remove_priority(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let command = RemovePriorityCommand {
        actor: user.actor(),
        request_id: id,
    };
    let request = state
        .services
        .requests
        .execute(command)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(request))
}

/// Flip the request between urgent and normal
#[utoipa::path(
    post,
    path = "/api/v1/requests/{id}/toggle-urgent",
    params(("id" = Uuid, Path, description = "Purchase request ID")),
    responses(
        (status = 200, description = "Priority toggled", body = crate::entities::purchase_request::Model),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "lifecycle"
)]
pub async fn toggle_urgent(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let command = ToggleUrgentCommand {
        actor: user.actor(),
        request_id: id,
    };
    let request = state
        .services
        .requests
        .execute(command)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(request))
}

/// Mark a request as completed
#[utoipa::path(
    post,
    path = "/api/v1/requests/{id}/complete",
    params(("id" = Uuid, Path, description = "Purchase request ID")),
    request_body(content = CompleteRequestBody, description = "Optional completion notes"),
    responses(
        (status = 200, description = "Request completed", body = crate::entities::purchase_request::Model),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse),
        (status = 409, description = "Request cannot be completed yet", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "lifecycle"
)]
pub async fn complete_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<CompleteRequestBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.map(|Json(body)| body).unwrap_or_default();
    validate_input(&payload)?;

    let command = CompleteRequestCommand {
        actor: user.actor(),
        request_id: id,
        completion_notes: payload.completion_notes,
    };
    let request = state
        .services
        .requests
        .execute(command)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(request))
}

/// Reopen a completed request
#[utoipa::path(
    post,
    path = "/api/v1/requests/{id}/reopen",
    params(("id" = Uuid, Path, description = "Purchase request ID")),
    responses(
        (status = 200, description = "Request reopened as approved", body = crate::entities::purchase_request::Model),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse),
        (status = 409, description = "Request is not completed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "lifecycle"
)]
pub async fn reopen_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let command = ReopenRequestCommand {
        actor: user.actor(),
        request_id: id,
    };
    let request = state
        .services
        .requests
        .execute(command)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(request))
}

/// Delivery progress of every approved item
#[utoipa::path(
    get,
    path = "/api/v1/requests/{id}/receipts/status",
    params(("id" = Uuid, Path, description = "Purchase request ID")),
    responses(
        (status = 200, description = "Receiving status", body = crate::services::receiving::RequestReceivingStatus),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "receiving"
)]
pub async fn receiving_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state
        .services
        .receiving
        .get_receiving_status(&user.actor(), id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(status))
}

/// Totals over every receipt of a request
#[utoipa::path(
    get,
    path = "/api/v1/requests/{id}/receipts/summary",
    params(("id" = Uuid, Path, description = "Purchase request ID")),
    responses(
        (status = 200, description = "Receipts summary", body = crate::services::receiving::ReceiptsSummary),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "receiving"
)]
pub async fn receipts_summary(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .services
        .receiving
        .get_receipts_summary(&user.actor(), id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(summary))
}

/// Creates the router for purchase request endpoints
pub fn request_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_requests).post(create_request))
        .route(
            "/:id",
            get(get_request).patch(update_request).delete(delete_request),
        )
        .route("/:id/review", patch(review_request))
        .route("/:id/priority", patch(set_priority).delete(remove_priority))
        .route("/:id/toggle-urgent", post(toggle_urgent))
        .route("/:id/complete", post(complete_request))
        .route("/:id/reopen", post(reopen_request))
        .route("/:id/receipts/status", get(receiving_status))
        .route("/:id/receipts/summary", get(receipts_summary))
}
