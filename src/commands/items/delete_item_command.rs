use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::Actor,
    commands::{
        support::{
            aggregate_status, live_items, lock_item_of, lock_request, save_request,
            tombstone_item,
        },
        Command,
    },
    db::{with_transaction, DbPool},
    entities::purchase_request,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::record_lifecycle,
    models::RequestStatus,
};

/// Removes an item. A request always keeps at least one item, and the
/// request status is re-aggregated over the remaining ones.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteItemCommand {
    pub actor: Actor,
    pub request_id: Uuid,
    pub item_id: Uuid,
}

#[async_trait]
impl Command for DeleteItemCommand {
    type Result = purchase_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(item_id = %self.item_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let actor = self.actor;
        let request_id = self.request_id;
        let item_id = self.item_id;

        let result = with_transaction(db_pool.as_ref(), "delete_item", move |txn| {
            Box::pin(async move {
                let request = lock_request(txn, request_id).await?;
                actor.require_owner_or_admin(request.requester_id)?;
                if !actor.is_admin() && request.status != RequestStatus::Pending {
                    return Err(ServiceError::Conflict(
                        "items of a reviewed request cannot be removed".to_string(),
                    ));
                }
                if request.status == RequestStatus::Completed {
                    return Err(ServiceError::Conflict(
                        "items of a completed request cannot be removed".to_string(),
                    ));
                }

                let item = lock_item_of(txn, request.id, item_id).await?;
                if live_items(txn, request.id).await?.len() <= 1 {
                    return Err(ServiceError::Conflict(
                        "the last item of a request cannot be removed".to_string(),
                    ));
                }

                tombstone_item(txn, &item).await?;

                let computed = aggregate_status(txn, request.id).await?;
                let changed = computed != request.status;
                let mut changes = purchase_request::ActiveModel {
                    updated_at: Set(Utc::now()),
                    ..Default::default()
                };
                if changed {
                    changes.status = Set(computed);
                }
                let request = save_request(txn, &request, changes).await?;
                Ok((request, changed))
            })
        })
        .await;

        record_lifecycle("delete_item", result.is_ok());
        let (request, changed) = result?;

        info!(item_id = %item_id, request_id = %request.id, "Request item removed");
        if changed {
            event_sender.send_or_log(Event::RequestUpdated {
                request_id: request.id,
                requester_id: request.requester_id,
                status: request.status,
            });
        }

        Ok(request)
    }
}
