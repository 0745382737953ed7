use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::Actor,
    commands::{
        support::{lock_item_of, lock_request, non_blank, save_item},
        Command,
    },
    db::{with_transaction, DbPool},
    entities::request_item,
    errors::ServiceError,
    events::EventSender,
    metrics::record_lifecycle,
    models::RequestStatus,
    services::receiving::net_received_for_item,
};

/// Edits quantity, deadline or admin notes of an item. Requesters may only
/// touch their own pending request and never the admin notes.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateItemCommand {
    pub actor: Actor,
    pub request_id: Uuid,
    pub item_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: Option<i32>,
    pub deadline: Option<DateTime<Utc>>,
    #[validate(length(max = 2000))]
    pub admin_notes: Option<String>,
}

#[async_trait]
impl Command for UpdateItemCommand {
    type Result = request_item::Model;

    #[instrument(skip(self, db_pool, _event_sender), fields(item_id = %self.item_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        _event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if !self.actor.is_admin() && self.admin_notes.is_some() {
            return Err(ServiceError::Forbidden(
                "only administrators may change admin notes".to_string(),
            ));
        }

        let actor = self.actor;
        let request_id = self.request_id;
        let item_id = self.item_id;
        let quantity = self.quantity;
        let deadline = self.deadline;
        let admin_notes = self.admin_notes.clone();

        let result = with_transaction(db_pool.as_ref(), "update_item", move |txn| {
            Box::pin(async move {
                let request = lock_request(txn, request_id).await?;
                actor.require_owner_or_admin(request.requester_id)?;
                if !actor.is_admin() && request.status != RequestStatus::Pending {
                    return Err(ServiceError::Conflict(
                        "items of a reviewed request cannot be changed".to_string(),
                    ));
                }

                let item = lock_item_of(txn, request.id, item_id).await?;

                let mut changes = request_item::ActiveModel::default();
                if let Some(quantity) = quantity {
                    // Ordered quantity never drops below what was already received
                    let received = net_received_for_item(txn, item.id).await?;
                    if i64::from(quantity) < received {
                        return Err(ServiceError::Conflict(format!(
                            "quantity {} is below the {} units already received",
                            quantity, received
                        )));
                    }
                    changes.quantity = Set(quantity);
                }
                if deadline.is_some() {
                    changes.deadline = Set(deadline);
                }
                if let Some(notes) = admin_notes {
                    changes.admin_notes = Set(non_blank(Some(&notes)));
                }

                save_item(txn, &item, changes).await
            })
        })
        .await;

        record_lifecycle("update_item", result.is_ok());
        let item = result?;

        info!(item_id = %item.id, "Request item updated");
        Ok(item)
    }
}
