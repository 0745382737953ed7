use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::Actor,
    commands::{
        support::{non_blank, orderable_product},
        Command,
    },
    db::{with_transaction, DbPool},
    entities::{purchase_request, request_item, user},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::record_lifecycle,
    models::{ItemStatus, Priority, RequestStatus},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewRequestItem {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreatePurchaseRequestCommand {
    pub actor: Actor,
    #[validate(length(max = 2000))]
    pub observations: Option<String>,
    #[validate(length(min = 1, message = "A purchase request needs at least one item"))]
    pub items: Vec<NewRequestItem>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatePurchaseRequestResult {
    pub request: purchase_request::Model,
    pub items: Vec<request_item::Model>,
}

#[async_trait]
impl Command for CreatePurchaseRequestCommand {
    type Result = CreatePurchaseRequestResult;

    #[instrument(skip(self, db_pool, event_sender), fields(requester = %self.actor.user_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        for item in &self.items {
            item.validate()?;
        }

        let mut seen = HashSet::new();
        if !self.items.iter().all(|item| seen.insert(item.product_id)) {
            return Err(ServiceError::BadRequest(
                "the same product appears more than once".to_string(),
            ));
        }

        let requester_id = self.actor.user_id;
        let observations = non_blank(self.observations.as_deref());
        let new_items = self.items.clone();

        let result = with_transaction(db_pool.as_ref(), "create_request", move |txn| {
            Box::pin(async move {
                let requester = user::Entity::find_by_id(requester_id)
                    .one(txn)
                    .await?
                    .filter(|u| u.deleted_at.is_none())
                    .ok_or_else(|| ServiceError::NotFound(format!("user {}", requester_id)))?;

                for item in &new_items {
                    orderable_product(txn, item.product_id, requester.sector_id).await?;
                }

                let now = Utc::now();
                let request = purchase_request::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    requester_id: Set(requester.id),
                    sector_id: Set(requester.sector_id),
                    status: Set(RequestStatus::Pending),
                    priority: Set(Priority::Normal),
                    priority_by: Set(None),
                    priority_at: Set(None),
                    priority_notes: Set(None),
                    observations: Set(observations),
                    admin_notes: Set(None),
                    reviewed_by: Set(None),
                    reviewed_at: Set(None),
                    completion_notes: Set(None),
                    completed_by: Set(None),
                    completed_at: Set(None),
                    version: Set(1),
                    created_at: Set(now),
                    updated_at: Set(now),
                    deleted_at: Set(None),
                }
                .insert(txn)
                .await?;

                let mut items = Vec::with_capacity(new_items.len());
                for item in new_items {
                    let saved = request_item::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        purchase_request_id: Set(request.id),
                        product_id: Set(item.product_id),
                        quantity: Set(item.quantity),
                        status: Set(ItemStatus::Pending),
                        admin_notes: Set(None),
                        suspension_reason: Set(None),
                        deadline: Set(item.deadline),
                        version: Set(1),
                        created_at: Set(now),
                        updated_at: Set(now),
                        deleted_at: Set(None),
                    }
                    .insert(txn)
                    .await?;
                    items.push(saved);
                }

                Ok(CreatePurchaseRequestResult { request, items })
            })
        })
        .await;

        record_lifecycle("create_request", result.is_ok());
        let result = result?;

        info!(
            request_id = %result.request.id,
            items = result.items.len(),
            "Purchase request created"
        );
        event_sender.send_or_log(Event::RequestCreated {
            request_id: result.request.id,
            requester_id: result.request.requester_id,
        });

        Ok(result)
    }
}
