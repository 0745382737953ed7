//! Purchase requisition workflow backend
//!
//! Requesters raise purchase requests; administrators review each item and the
//! request status is derived from the item decisions. Approved items are then
//! received against supplier invoices.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod commands;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod notifications;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{extract::FromRef, response::Json, routing::get, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;

use crate::auth::{AuthRouterExt, AuthService};
use crate::db::DbPool;
use crate::events::EventSender;
use crate::notifications::NotificationHub;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub event_sender: Arc<EventSender>,
    pub auth: Arc<AuthService>,
    pub notifications: Arc<NotificationHub>,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires the service layer on top of the shared resources.
    pub fn new(
        db: Arc<DbPool>,
        config: config::AppConfig,
        event_sender: Arc<EventSender>,
        auth: Arc<AuthService>,
        notifications: Arc<NotificationHub>,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), event_sender.clone(), auth.clone());
        Self {
            db,
            config,
            event_sender,
            auth,
            notifications,
            services,
        }
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

// Common response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }
}

/// Every `/api/v1` route. Login and health are public; the notification
/// stream accepts a query token; everything else needs a bearer token.
pub fn api_v1_routes(auth: Arc<AuthService>) -> Router<AppState> {
    let requests = handlers::requests::request_routes()
        .merge(handlers::items::item_routes())
        .merge(handlers::budgets::request_budget_routes())
        .with_auth(auth.clone());

    let notifications = handlers::notifications::notification_stream_routes()
        .with_stream_auth(auth.clone())
        .merge(handlers::notifications::notification_admin_routes().with_auth(auth.clone()));

    Router::new()
        // Public
        .route("/status", get(api_status))
        .nest("/health", handlers::health::health_routes())
        .nest("/auth", handlers::auth::auth_routes())
        // Workflow
        .nest("/requests", requests)
        .nest(
            "/budgets",
            handlers::budgets::budget_routes().with_auth(auth.clone()),
        )
        // Catalog
        .nest(
            "/sectors",
            handlers::catalog::sector_routes().with_auth(auth.clone()),
        )
        .nest(
            "/suppliers",
            handlers::catalog::supplier_routes().with_auth(auth.clone()),
        )
        .nest(
            "/products",
            handlers::catalog::product_routes().with_auth(auth.clone()),
        )
        // Accounts
        .nest("/users", handlers::users::user_routes().with_auth(auth.clone()))
        .nest("/profile", handlers::users::profile_routes().with_auth(auth))
        .nest("/notifications", notifications)
}

/// The application router without CORS, which the binary adds from config.
pub fn app_router(state: AppState) -> Router {
    let auth = state.auth.clone();
    Router::new()
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/api/v1", api_v1_routes(auth))
        .merge(openapi::swagger_ui())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status() -> Json<ApiResponse<Value>> {
    Json(ApiResponse::success(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    })))
}
