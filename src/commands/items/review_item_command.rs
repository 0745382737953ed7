use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::Actor,
    commands::{
        support::{
            aggregate_status, find_item, lock_item_of, lock_request, non_blank, save_item,
            save_request,
        },
        Command,
    },
    db::{with_transaction, DbPool},
    entities::{purchase_request, request_item},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::record_lifecycle,
    models::{ItemStatus, RequestStatus},
};

/// Admin decision on one item. The owning request's status is recomputed
/// from all of its items in the same transaction.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ReviewItemCommand {
    pub actor: Actor,
    pub item_id: Uuid,
    pub status: ItemStatus,
    #[validate(length(max = 2000))]
    pub admin_notes: Option<String>,
    #[validate(length(max = 1000))]
    pub suspension_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReviewItemResult {
    pub item: request_item::Model,
    pub request_status: RequestStatus,
    pub request_status_changed: bool,
}

#[async_trait]
impl Command for ReviewItemCommand {
    type Result = ReviewItemResult;

    #[instrument(skip(self, db_pool, event_sender), fields(item_id = %self.item_id, status = %self.status))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        self.actor.require_admin()?;

        if !self.status.is_review_target() {
            return Err(ServiceError::ValidationError(
                "status must be one of approved, rejected, suspended".to_string(),
            ));
        }

        let reason = non_blank(self.suspension_reason.as_deref());
        if self.status == ItemStatus::Suspended && reason.is_none() {
            return Err(ServiceError::ValidationError(
                "suspension reason required".to_string(),
            ));
        }
        let reason = if self.status == ItemStatus::Suspended {
            reason
        } else {
            None
        };

        let item_id = self.item_id;
        let status = self.status;
        let admin_notes = non_blank(self.admin_notes.as_deref());

        let result = with_transaction(db_pool.as_ref(), "review_item", move |txn| {
            Box::pin(async move {
                let request_id = find_item(txn, item_id).await?.purchase_request_id;
                let request = lock_request(txn, request_id).await?;
                let item = lock_item_of(txn, request.id, item_id).await?;

                if request.status == RequestStatus::Completed {
                    return Err(ServiceError::Conflict(
                        "items of a completed request cannot be reviewed; reopen it first"
                            .to_string(),
                    ));
                }

                let item = save_item(
                    txn,
                    &item,
                    request_item::ActiveModel {
                        status: Set(status),
                        admin_notes: Set(admin_notes),
                        suspension_reason: Set(reason),
                        ..Default::default()
                    },
                )
                .await?;

                let computed = aggregate_status(txn, request.id).await?;
                let changed = computed != request.status;
                debug!(from = %request.status, to = %computed, "request status recomputed");

                let mut changes = purchase_request::ActiveModel::default();
                if changed {
                    changes.status = Set(computed);
                    changes.updated_at = Set(Utc::now());
                }
                // Always bumps the version so concurrent reviews of sibling items serialize
                let request = save_request(txn, &request, changes).await?;

                Ok((item, request, changed))
            })
        })
        .await;

        record_lifecycle("review_item", result.is_ok());
        let (item, request, changed) = result?;

        info!(
            item_id = %item.id,
            request_id = %request.id,
            request_status = %request.status,
            request_status_changed = changed,
            "Request item reviewed"
        );
        event_sender.send_or_log(Event::ItemReviewed {
            item_id: item.id,
            request_id: request.id,
            requester_id: request.requester_id,
            status: item.status,
        });

        Ok(ReviewItemResult {
            item,
            request_status: request.status,
            request_status_changed: changed,
        })
    }
}
