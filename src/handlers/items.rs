use super::common::{created_response, map_service_error, success_response, validate_input};
use crate::{
    auth::AuthUser,
    commands::{
        items::{AddItemCommand, DeleteItemCommand, ReviewItemCommand, UpdateItemCommand},
        receipts::CreateReceiptCommand,
    },
    errors::ApiError,
    handlers::AppState,
    models::{ItemStatus, ReceiptCondition},
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, patch},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddItemBody {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateItemBody {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: Option<i32>,
    pub deadline: Option<DateTime<Utc>>,
    #[validate(length(max = 2000))]
    pub admin_notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReviewItemBody {
    pub status: ItemStatus,
    #[validate(length(max = 2000))]
    pub admin_notes: Option<String>,
    #[validate(length(max = 2000))]
    pub suspension_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateReceiptBody {
    #[validate(range(min = 1, message = "Quantity received must be at least 1"))]
    pub quantity_received: i32,
    #[serde(default)]
    #[validate(range(min = 0, message = "Rejected quantity cannot be negative"))]
    pub rejected_quantity: i32,
    #[validate(length(min = 1, max = 100, message = "Invoice number is required"))]
    pub invoice_number: String,
    pub invoice_date: Option<DateTime<Utc>>,
    #[validate(length(max = 100))]
    pub lot_number: Option<String>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub supplier_id: Option<Uuid>,
    pub receipt_condition: Option<ReceiptCondition>,
    #[serde(default)]
    pub quality_checked: bool,
    #[validate(length(max = 2000))]
    pub quality_notes: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// List the live items of a request
#[utoipa::path(
    get,
    path = "/api/v1/requests/{id}/items",
    params(("id" = Uuid, Path, description = "Purchase request ID")),
    responses(
        (status = 200, description = "Items", body = [crate::entities::request_item::Model]),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "items"
)]
pub async fn list_items(
    State(state): State<AppState>,
    user: AuthUser,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state
        .services
        .requests
        .list_items(&user.actor(), request_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(items))
}

/// Get one item of a request
#[utoipa::path(
    get,
    path = "/api/v1/requests/{id}/items/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Purchase request ID"),
        ("item_id" = Uuid, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item", body = crate::entities::request_item::Model),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "items"
)]
pub async fn get_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path((request_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .services
        .requests
        .get_item(&user.actor(), request_id, item_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(item))
}

/// Add an item to a pending request
#[utoipa::path(
    post,
    path = "/api/v1/requests/{id}/items",
    params(("id" = Uuid, Path, description = "Purchase request ID")),
    request_body = AddItemBody,
    responses(
        (status = 201, description = "Item added", body = crate::entities::request_item::Model),
        (status = 409, description = "Product already on the request or request not editable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "items"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<AddItemBody>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let command = AddItemCommand {
        actor: user.actor(),
        request_id,
        product_id: payload.product_id,
        quantity: payload.quantity,
        deadline: payload.deadline,
    };
    let item = state
        .services
        .requests
        .execute(command)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(item))
}

/// Update quantity, deadline or admin notes of an item
#[utoipa::path(
    patch,
    path = "/api/v1/requests/{id}/items/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Purchase request ID"),
        ("item_id" = Uuid, Path, description = "Item ID")
    ),
    request_body = UpdateItemBody,
    responses(
        (status = 200, description = "Item updated", body = crate::entities::request_item::Model),
        (status = 400, description = "Quantity below what was already received", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "items"
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path((request_id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateItemBody>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let command = UpdateItemCommand {
        actor: user.actor(),
        request_id,
        item_id,
        quantity: payload.quantity,
        deadline: payload.deadline,
        admin_notes: payload.admin_notes,
    };
    let item = state
        .services
        .requests
        .execute(command)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(item))
}

/// Remove an item from a request
#[utoipa::path(
    delete,
    path = "/api/v1/requests/{id}/items/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Purchase request ID"),
        ("item_id" = Uuid, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item removed, request returned with its new status", body = crate::entities::purchase_request::Model),
        (status = 409, description = "Last item of the request", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "items"
)]
pub async fn delete_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path((request_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let command = DeleteItemCommand {
        actor: user.actor(),
        request_id,
        item_id,
    };
    let request = state
        .services
        .requests
        .execute(command)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(request))
}

/// Review a single item; the request status is recomputed from its items
#[utoipa::path(
    patch,
    path = "/api/v1/requests/{id}/items/{item_id}/review",
    params(
        ("id" = Uuid, Path, description = "Purchase request ID"),
        ("item_id" = Uuid, Path, description = "Item ID")
    ),
    request_body = ReviewItemBody,
    responses(
        (status = 200, description = "Item reviewed", body = crate::commands::items::ReviewItemResult),
        (status = 400, description = "Status not allowed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse),
        (status = 409, description = "Request already completed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "lifecycle"
)]
pub async fn review_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path((request_id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ReviewItemBody>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let actor = user.actor();

    // Rejects an item id that belongs to another request
    state
        .services
        .requests
        .get_item(&actor, request_id, item_id)
        .await
        .map_err(map_service_error)?;

    let command = ReviewItemCommand {
        actor,
        item_id,
        status: payload.status,
        admin_notes: payload.admin_notes,
        suspension_reason: payload.suspension_reason,
    };
    let result = state
        .services
        .requests
        .execute(command)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(result))
}

/// Record a delivery against an approved item
#[utoipa::path(
    post,
    path = "/api/v1/requests/{id}/items/{item_id}/receipts",
    params(
        ("id" = Uuid, Path, description = "Purchase request ID"),
        ("item_id" = Uuid, Path, description = "Item ID")
    ),
    request_body = CreateReceiptBody,
    responses(
        (status = 201, description = "Receipt recorded", body = crate::entities::item_receipt::Model),
        (status = 400, description = "Quantity exceeds order or invalid input", body = crate::errors::ErrorResponse),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse),
        (status = 409, description = "Item or request not receivable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "receiving"
)]
pub async fn create_receipt(
    State(state): State<AppState>,
    user: AuthUser,
    Path((request_id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CreateReceiptBody>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let actor = user.actor();

    state
        .services
        .requests
        .get_item(&actor, request_id, item_id)
        .await
        .map_err(map_service_error)?;

    let command = CreateReceiptCommand {
        actor,
        item_id,
        quantity_received: payload.quantity_received,
        rejected_quantity: payload.rejected_quantity,
        invoice_number: payload.invoice_number,
        invoice_date: payload.invoice_date,
        lot_number: payload.lot_number,
        expiration_date: payload.expiration_date,
        supplier_id: payload.supplier_id,
        receipt_condition: payload.receipt_condition,
        quality_checked: payload.quality_checked,
        quality_notes: payload.quality_notes,
        notes: payload.notes,
    };
    let receipt = state
        .services
        .receiving
        .create_receipt(command)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(receipt))
}

/// Receipts of an item, newest first
#[utoipa::path(
    get,
    path = "/api/v1/requests/{id}/items/{item_id}/receipts",
    params(
        ("id" = Uuid, Path, description = "Purchase request ID"),
        ("item_id" = Uuid, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Receipts", body = [crate::entities::item_receipt::Model]),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "receiving"
)]
pub async fn list_receipts(
    State(state): State<AppState>,
    user: AuthUser,
    Path((request_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = user.actor();
    state
        .services
        .requests
        .get_item(&actor, request_id, item_id)
        .await
        .map_err(map_service_error)?;

    let receipts = state
        .services
        .receiving
        .list_item_receipts(&actor, item_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(receipts))
}

/// Item routes, nested under `/requests`
pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/:id/items", get(list_items).post(add_item))
        .route(
            "/:id/items/:item_id",
            get(get_item).patch(update_item).delete(delete_item),
        )
        .route("/:id/items/:item_id/review", patch(review_item))
        .route(
            "/:id/items/:item_id/receipts",
            get(list_receipts).post(create_receipt),
        )
}
