pub mod auth;
pub mod budgets;
pub mod catalog;
pub mod common;
pub mod health;
pub mod items;
pub mod notifications;
pub mod requests;
pub mod users;

use crate::auth::AuthService;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    BudgetService, CatalogService, ReceivingService, RequestService, UserService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub requests: Arc<RequestService>,
    pub receiving: Arc<ReceivingService>,
    pub budgets: Arc<BudgetService>,
    pub catalog: Arc<CatalogService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        auth_service: Arc<AuthService>,
    ) -> Self {
        Self {
            requests: Arc::new(RequestService::new(db_pool.clone(), event_sender.clone())),
            receiving: Arc::new(ReceivingService::new(db_pool.clone(), event_sender)),
            budgets: Arc::new(BudgetService::new(db_pool.clone())),
            catalog: Arc::new(CatalogService::new(db_pool.clone())),
            users: Arc::new(UserService::new(db_pool, auth_service)),
        }
    }
}
