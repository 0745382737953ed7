use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    auth::Actor,
    commands::Command,
    db::DbPool,
    entities::{purchase_request, request_item},
    errors::ServiceError,
    events::EventSender,
    models::{Priority, RequestStatus},
};

/// Query filters for listing requests.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub priority: Option<Priority>,
}

/// A request together with its live items.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RequestWithItems {
    #[serde(flatten)]
    pub request: purchase_request::Model,
    pub items: Vec<request_item::Model>,
}

/// Runs lifecycle commands and serves the read side of requests and items.
#[derive(Clone)]
pub struct RequestService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl RequestService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Executes any request or item command against this service's pool.
    pub async fn execute<C: Command>(&self, command: C) -> Result<C::Result, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Admins see every request, requesters only their own. Newest first.
    #[instrument(skip(self, actor))]
    pub async fn list_requests(
        &self,
        actor: &Actor,
        filter: RequestFilter,
    ) -> Result<Vec<RequestWithItems>, ServiceError> {
        let db = self.db_pool.as_ref();
        let mut query =
            purchase_request::Entity::find().filter(purchase_request::Column::DeletedAt.is_null());
        if !actor.is_admin() {
            query = query.filter(purchase_request::Column::RequesterId.eq(actor.user_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(purchase_request::Column::Status.eq(status));
        }
        if let Some(priority) = filter.priority {
            query = query.filter(purchase_request::Column::Priority.eq(priority));
        }
        let requests = query
            .order_by_desc(purchase_request::Column::CreatedAt)
            .all(db)
            .await?;

        let ids: Vec<Uuid> = requests.iter().map(|r| r.id).collect();
        let mut items_by_request: HashMap<Uuid, Vec<request_item::Model>> = HashMap::new();
        if !ids.is_empty() {
            for item in request_item::Entity::find()
                .filter(request_item::Column::PurchaseRequestId.is_in(ids))
                .filter(request_item::Column::DeletedAt.is_null())
                .order_by_asc(request_item::Column::CreatedAt)
                .all(db)
                .await?
            {
                items_by_request
                    .entry(item.purchase_request_id)
                    .or_default()
                    .push(item);
            }
        }

        debug!(count = requests.len(), "Listed purchase requests");
        Ok(requests
            .into_iter()
            .map(|request| {
                let items = items_by_request.remove(&request.id).unwrap_or_default();
                RequestWithItems { request, items }
            })
            .collect())
    }

    #[instrument(skip(self, actor))]
    pub async fn get_request(
        &self,
        actor: &Actor,
        request_id: Uuid,
    ) -> Result<RequestWithItems, ServiceError> {
        let request = self.visible_request(actor, request_id).await?;
        let items = self.live_items(request.id).await?;
        Ok(RequestWithItems { request, items })
    }

    #[instrument(skip(self, actor))]
    pub async fn list_items(
        &self,
        actor: &Actor,
        request_id: Uuid,
    ) -> Result<Vec<request_item::Model>, ServiceError> {
        let request = self.visible_request(actor, request_id).await?;
        self.live_items(request.id).await
    }

    #[instrument(skip(self, actor))]
    pub async fn get_item(
        &self,
        actor: &Actor,
        request_id: Uuid,
        item_id: Uuid,
    ) -> Result<request_item::Model, ServiceError> {
        let request = self.visible_request(actor, request_id).await?;
        request_item::Entity::find_by_id(item_id)
            .filter(request_item::Column::PurchaseRequestId.eq(request.id))
            .filter(request_item::Column::DeletedAt.is_null())
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("request item {}", item_id)))
    }

    async fn visible_request(
        &self,
        actor: &Actor,
        request_id: Uuid,
    ) -> Result<purchase_request::Model, ServiceError> {
        let request = purchase_request::Entity::find_by_id(request_id)
            .filter(purchase_request::Column::DeletedAt.is_null())
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase request {}", request_id)))?;
        actor.require_owner_or_admin(request.requester_id)?;
        Ok(request)
    }

    async fn live_items(&self, request_id: Uuid) -> Result<Vec<request_item::Model>, ServiceError> {
        let items = request_item::Entity::find()
            .filter(request_item::Column::PurchaseRequestId.eq(request_id))
            .filter(request_item::Column::DeletedAt.is_null())
            .order_by_asc(request_item::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await?;
        Ok(items)
    }
}
