#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use purchase_requests_api::{
    app_router,
    auth::{Actor, AuthConfig, AuthService},
    config::AppConfig,
    db::{self, DbConfig},
    entities::{product, sector, user},
    events::{self, EventSender},
    models::Role,
    notifications::{NotificationHub, Notifier},
    services::{
        catalog::{CreateProductInput, SectorInput},
        users::CreateUserInput,
        CatalogService, UserService,
    },
    AppState,
};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "q8Vn2Lx7Rt4Wz1Ky6Hs3Jd9Mb5Pc0Fg_integration";

/// A seeded account together with a token for it.
pub struct Account {
    pub user: user::Model,
    pub token: String,
}

impl Account {
    pub fn actor(&self) -> Actor {
        Actor::new(self.user.id, self.user.role)
    }
}

/// Application backed by a throwaway SQLite file with one sector, an admin
/// and a requester already in place.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub sector: sector::Model,
    pub admin: Account,
    pub requester: Account,
    _event_task: tokio::task::JoinHandle<()>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("purchase_requests_test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        let pool = db::establish_connection_with_config(&DbConfig {
            url: url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .expect("failed to open test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db = Arc::new(pool);

        let mut cfg = AppConfig::new(
            url,
            TEST_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.sse_keep_alive_secs = 1;

        let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let hub = NotificationHub::new(cfg.notification_buffer);
        let notifier: Arc<dyn Notifier> = hub.clone();
        let event_task = tokio::spawn(events::process_events(event_rx, notifier));

        let auth = Arc::new(AuthService::new(AuthConfig::new(
            TEST_SECRET.to_string(),
            Duration::from_secs(3600),
        )));

        let state = AppState::new(db.clone(), cfg, event_sender, auth.clone(), hub);
        let router = app_router(state.clone());

        let catalog = CatalogService::new(db.clone());
        let users = UserService::new(db, auth.clone());
        let bootstrap = Actor::new(Uuid::nil(), Role::Admin);

        let sector = catalog
            .create_sector(
                &bootstrap,
                SectorInput {
                    name: "Compras".to_string(),
                },
            )
            .await
            .expect("seed sector");

        let admin = seed_account(&users, &auth, &sector, "Ana Admin", "ana@example.com", Role::Admin).await;
        let requester = seed_account(
            &users,
            &auth,
            &sector,
            "Rui Requester",
            "rui@example.com",
            Role::Requester,
        )
        .await;

        Self {
            router,
            state,
            sector,
            admin,
            requester,
            _event_task: event_task,
            _dir: dir,
        }
    }

    /// Adds another requester in a sector of their own.
    pub async fn other_requester(&self, email: &str) -> Account {
        let bootstrap = Actor::new(Uuid::nil(), Role::Admin);
        let sector = self
            .state
            .services
            .catalog
            .create_sector(
                &bootstrap,
                SectorInput {
                    name: format!("Sector for {email}"),
                },
            )
            .await
            .expect("seed second sector");
        seed_account(
            &self.state.services.users,
            &self.state.auth,
            &sector,
            "Other Requester",
            email,
            Role::Requester,
        )
        .await
    }

    /// Creates an available product in the shared sector.
    pub async fn seed_product(&self, name: &str) -> product::Model {
        self.state
            .services
            .catalog
            .create_product(
                &self.admin.actor(),
                CreateProductInput {
                    name: name.to_string(),
                    description: None,
                    unit: "box".to_string(),
                    sector_id: self.sector.id,
                },
            )
            .await
            .expect("seed product")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request builds");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router responds")
    }

    pub async fn as_admin(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, Some(&self.admin.token), body).await
    }

    pub async fn as_requester(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, Some(&self.requester.token), body)
            .await
    }

    /// Requester creates a request for the given products, one unit count each.
    pub async fn create_request(&self, lines: &[(Uuid, i32)]) -> Value {
        let items: Vec<Value> = lines
            .iter()
            .map(|(product_id, quantity)| {
                serde_json::json!({ "product_id": product_id, "quantity": quantity })
            })
            .collect();
        let response = self
            .as_requester(
                Method::POST,
                "/api/v1/requests",
                Some(serde_json::json!({ "observations": "office restock", "items": items })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        response_json(response).await
    }

    pub async fn review_item(&self, request_id: &str, item_id: &str, status: &str) -> Response {
        let mut body = serde_json::json!({ "status": status });
        if status == "suspended" {
            body["suspension_reason"] = Value::from("supplier out of stock");
        }
        self.as_admin(
            Method::PATCH,
            &format!("/api/v1/requests/{request_id}/items/{item_id}/review"),
            Some(body),
        )
        .await
    }
}

async fn seed_account(
    users: &UserService,
    auth: &AuthService,
    sector: &sector::Model,
    name: &str,
    email: &str,
    role: Role,
) -> Account {
    let user = users
        .insert_user(CreateUserInput {
            name: name.to_string(),
            email: email.to_string(),
            password: "s3cure-Passw0rd".to_string(),
            role,
            sector_id: sector.id,
        })
        .await
        .expect("seed user");
    let token = auth.issue_token(&user, sector).expect("issue token");
    Account { user, token }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("id field").to_string()
}
