use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Purchase Requests API",
        version = "0.1.0",
        description = r#"
# Purchase Requisition Workflow

Requesters raise purchase requests for catalog products; administrators review
each item, and the request status follows from the item decisions. Approved
items are received against supplier invoices until the order is fulfilled.

## Authentication

Obtain a token from `POST /api/v1/auth/login` and send it on every call:

```
Authorization: Bearer <token>
```

The notification stream also accepts `?token=<token>` for `EventSource` clients.

## Errors

Failures share one body shape:

```json
{
  "error": "Conflict",
  "message": "purchase request cannot be completed in status pending",
  "request_id": "4f1c...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Login"),
        (name = "requests", description = "Purchase request CRUD"),
        (name = "items", description = "Request items"),
        (name = "lifecycle", description = "Review, priority, completion and reopening"),
        (name = "receiving", description = "Deliveries against approved items"),
        (name = "budgets", description = "Supplier quotes per item"),
        (name = "catalog", description = "Sectors, suppliers and products"),
        (name = "users", description = "User administration"),
        (name = "profile", description = "The caller's own account"),
        (name = "notifications", description = "Server-sent notifications"),
        (name = "health", description = "Health check")
    ),
    paths(
        crate::handlers::auth::login,

        crate::handlers::requests::create_request,
        crate::handlers::requests::list_requests,
        crate::handlers::requests::get_request,
        crate::handlers::requests::update_request,
        crate::handlers::requests::delete_request,
        crate::handlers::requests::review_request,
        crate::handlers::requests::set_priority,
        crate::handlers::requests::remove_priority,
        crate::handlers::requests::toggle_urgent,
        crate::handlers::requests::complete_request,
        crate::handlers::requests::reopen_request,
        crate::handlers::requests::receiving_status,
        crate::handlers::requests::receipts_summary,

        crate::handlers::items::list_items,
        crate::handlers::items::get_item,
        crate::handlers::items::add_item,
        crate::handlers::items::update_item,
        crate::handlers::items::delete_item,
        crate::handlers::items::review_item,
        crate::handlers::items::create_receipt,
        crate::handlers::items::list_receipts,

        crate::handlers::budgets::create_budget,
        crate::handlers::budgets::list_request_budgets,
        crate::handlers::budgets::update_budget,
        crate::handlers::budgets::delete_budget,

        crate::handlers::catalog::list_sectors,
        crate::handlers::catalog::create_sector,
        crate::handlers::catalog::update_sector,
        crate::handlers::catalog::delete_sector,
        crate::handlers::catalog::list_suppliers,
        crate::handlers::catalog::get_supplier,
        crate::handlers::catalog::create_supplier,
        crate::handlers::catalog::update_supplier,
        crate::handlers::catalog::delete_supplier,
        crate::handlers::catalog::list_products,
        crate::handlers::catalog::get_product,
        crate::handlers::catalog::create_product,
        crate::handlers::catalog::update_product,
        crate::handlers::catalog::delete_product,

        crate::handlers::users::list_users,
        crate::handlers::users::create_user,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::users::promote_user,
        crate::handlers::users::get_profile,
        crate::handlers::users::update_profile,
        crate::handlers::users::change_password,

        crate::handlers::notifications::stream_notifications,
        crate::handlers::notifications::notification_stats,
        crate::handlers::notifications::send_notification,

        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::models::RequestStatus,
            crate::models::ItemStatus,
            crate::models::Priority,
            crate::models::ReceiptCondition,
            crate::models::ProductStatus,
            crate::models::ReceivingStatus,
            crate::models::Role,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_workflow_paths_and_bearer_scheme() {
        let json = serde_json::to_string(&ApiDocV1::openapi()).unwrap();
        assert!(json.contains("Purchase Requests API"));
        assert!(json.contains("/api/v1/requests/{id}/items/{item_id}/review"));
        assert!(json.contains("/api/v1/requests/{id}/receipts/status"));
        assert!(json.contains("bearer_auth"));
    }
}
