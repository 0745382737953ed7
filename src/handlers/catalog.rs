//! Sectors, suppliers and products. Writes on sectors and suppliers are
//! admin-only; products may also be maintained by requesters within their
//! own sector.

use super::common::{created_response, map_service_error, no_content_response, success_response};
use crate::{
    auth::AuthUser,
    errors::ApiError,
    handlers::AppState,
    services::catalog::{
        CreateProductInput, CreateSupplierInput, SectorInput, UpdateProductInput,
        UpdateSupplierInput,
    },
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, patch},
    Router,
};
use uuid::Uuid;

// ---- sectors ----

#[utoipa::path(
    get,
    path = "/api/v1/sectors",
    responses((status = 200, description = "Sectors by name", body = [crate::entities::sector::Model])),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn list_sectors(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let sectors = state
        .services
        .catalog
        .list_sectors()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(sectors))
}

#[utoipa::path(
    post,
    path = "/api/v1/sectors",
    request_body = SectorInput,
    responses(
        (status = 201, description = "Sector created", body = crate::entities::sector::Model),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already used", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn create_sector(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SectorInput>,
) -> Result<impl IntoResponse, ApiError> {
    let sector = state
        .services
        .catalog
        .create_sector(&user.actor(), payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(sector))
}

#[utoipa::path(
    patch,
    path = "/api/v1/sectors/{id}",
    params(("id" = Uuid, Path, description = "Sector ID")),
    request_body = SectorInput,
    responses(
        (status = 200, description = "Sector renamed", body = crate::entities::sector::Model),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already used", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn update_sector(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SectorInput>,
) -> Result<impl IntoResponse, ApiError> {
    let sector = state
        .services
        .catalog
        .update_sector(&user.actor(), id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(sector))
}

#[utoipa::path(
    delete,
    path = "/api/v1/sectors/{id}",
    params(("id" = Uuid, Path, description = "Sector ID")),
    responses(
        (status = 204, description = "Sector deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn delete_sector(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .catalog
        .delete_sector(&user.actor(), id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

// ---- suppliers ----

#[utoipa::path(
    get,
    path = "/api/v1/suppliers",
    responses((status = 200, description = "Suppliers by name", body = [crate::entities::supplier::Model])),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn list_suppliers(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let suppliers = state
        .services
        .catalog
        .list_suppliers()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(suppliers))
}

#[utoipa::path(
    get,
    path = "/api/v1/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    responses(
        (status = 200, description = "Supplier", body = crate::entities::supplier::Model),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn get_supplier(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let supplier = state
        .services
        .catalog
        .get_supplier(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(supplier))
}

#[utoipa::path(
    post,
    path = "/api/v1/suppliers",
    request_body = CreateSupplierInput,
    responses(
        (status = 201, description = "Supplier created", body = crate::entities::supplier::Model),
        (status = 400, description = "Invalid CNPJ or email", body = crate::errors::ErrorResponse),
        (status = 409, description = "CNPJ already registered", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn create_supplier(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateSupplierInput>,
) -> Result<impl IntoResponse, ApiError> {
    let supplier = state
        .services
        .catalog
        .create_supplier(&user.actor(), payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(supplier))
}

#[utoipa::path(
    patch,
    path = "/api/v1/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    request_body = UpdateSupplierInput,
    responses(
        (status = 200, description = "Supplier updated", body = crate::entities::supplier::Model),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "CNPJ already registered", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn update_supplier(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSupplierInput>,
) -> Result<impl IntoResponse, ApiError> {
    let supplier = state
        .services
        .catalog
        .update_supplier(&user.actor(), id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(supplier))
}

#[utoipa::path(
    delete,
    path = "/api/v1/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    responses(
        (status = 204, description = "Supplier deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn delete_supplier(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .catalog
        .delete_supplier(&user.actor(), id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

// ---- products ----

#[utoipa::path(
    get,
    path = "/api/v1/products",
    responses((status = 200, description = "Products visible to the caller", body = [crate::entities::product::Model])),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .services
        .catalog
        .list_products(&user.actor())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(products))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = crate::entities::product::Model),
        (status = 403, description = "Product of another sector", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .get_product(&user.actor(), id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductInput,
    responses(
        (status = 201, description = "Product created", body = crate::entities::product::Model),
        (status = 400, description = "Unknown sector", body = crate::errors::ErrorResponse),
        (status = 403, description = "Product for another sector", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .create_product(&user.actor(), payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(product))
}

#[utoipa::path(
    patch,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductInput,
    responses(
        (status = 200, description = "Product updated", body = crate::entities::product::Model),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .update_product(&user.actor(), id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 409, description = "Product is used by a request", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .catalog
        .delete_product(&user.actor(), id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

pub fn sector_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sectors).post(create_sector))
        .route("/:id", patch(update_sector).delete(delete_sector))
}

pub fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_suppliers).post(create_supplier))
        .route(
            "/:id",
            get(get_supplier)
                .patch(update_supplier)
                .delete(delete_supplier),
        )
}

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).patch(update_product).delete(delete_product),
        )
}
