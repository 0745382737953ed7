use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::Actor,
    commands::{
        support::{aggregate_status, live_items, lock_request, orderable_product, save_request},
        Command,
    },
    db::{with_transaction, DbPool},
    entities::{purchase_request, request_item},
    errors::ServiceError,
    events::EventSender,
    metrics::record_lifecycle,
    models::{ItemStatus, RequestStatus},
};

/// Adds an item to the owner's still-pending request.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AddItemCommand {
    pub actor: Actor,
    pub request_id: Uuid,
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub deadline: Option<DateTime<Utc>>,
}

#[async_trait]
impl Command for AddItemCommand {
    type Result = request_item::Model;

    #[instrument(skip(self, db_pool, _event_sender), fields(request_id = %self.request_id, product_id = %self.product_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        _event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let actor = self.actor;
        let request_id = self.request_id;
        let product_id = self.product_id;
        let quantity = self.quantity;
        let deadline = self.deadline;

        let result = with_transaction(db_pool.as_ref(), "add_item", move |txn| {
            Box::pin(async move {
                let request = lock_request(txn, request_id).await?;
                if !request.is_owned_by(actor.user_id) {
                    return Err(ServiceError::Forbidden(
                        "only the requester can add items to a request".to_string(),
                    ));
                }
                if request.status != RequestStatus::Pending {
                    return Err(ServiceError::Conflict(
                        "items can only be added while the request is pending".to_string(),
                    ));
                }

                orderable_product(txn, product_id, request.sector_id).await?;

                if live_items(txn, request.id)
                    .await?
                    .iter()
                    .any(|item| item.product_id == product_id)
                {
                    return Err(ServiceError::Conflict(
                        "this product is already on the request".to_string(),
                    ));
                }

                let now = Utc::now();
                let item = request_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    purchase_request_id: Set(request.id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    status: Set(ItemStatus::Pending),
                    admin_notes: Set(None),
                    suspension_reason: Set(None),
                    deadline: Set(deadline),
                    version: Set(1),
                    created_at: Set(now),
                    updated_at: Set(now),
                    deleted_at: Set(None),
                }
                .insert(txn)
                .await?;

                let computed = aggregate_status(txn, request.id).await?;
                let mut changes = purchase_request::ActiveModel {
                    updated_at: Set(now),
                    ..Default::default()
                };
                if computed != request.status {
                    changes.status = Set(computed);
                }
                save_request(txn, &request, changes).await?;

                Ok(item)
            })
        })
        .await;

        record_lifecycle("add_item", result.is_ok());
        let item = result?;

        info!(item_id = %item.id, request_id = %item.purchase_request_id, "Request item added");
        Ok(item)
    }
}
