use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::Actor,
    commands::{
        support::{live_items, lock_request, non_blank, save_request},
        Command,
    },
    db::{with_transaction, DbPool},
    entities::purchase_request,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::record_lifecycle,
    models::{ItemStatus, RequestStatus},
};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CompleteRequestCommand {
    pub actor: Actor,
    pub request_id: Uuid,
    #[validate(length(max = 2000))]
    pub completion_notes: Option<String>,
}

#[async_trait]
impl Command for CompleteRequestCommand {
    type Result = purchase_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        self.actor.require_admin()?;

        let request_id = self.request_id;
        let completed_by = self.actor.user_id;
        let notes = non_blank(self.completion_notes.as_deref());

        let result = with_transaction(db_pool.as_ref(), "complete_request", move |txn| {
            Box::pin(async move {
                let request = lock_request(txn, request_id).await?;
                let items = live_items(txn, request_id).await?;

                // Guards run in this order and before any write
                let pending = items
                    .iter()
                    .filter(|item| item.status == ItemStatus::Pending)
                    .count();
                if pending > 0 {
                    return Err(ServiceError::Conflict(format!(
                        "cannot complete with {} pending items",
                        pending
                    )));
                }

                if !request.status.is_completable() {
                    return Err(ServiceError::Conflict(format!(
                        "request must be approved or partial to be completed, found {}",
                        request.status
                    )));
                }

                if !items
                    .iter()
                    .any(|item| item.status.counts_toward_completion())
                {
                    return Err(ServiceError::Conflict(
                        "cannot complete without at least one approved or suspended item"
                            .to_string(),
                    ));
                }

                let now = Utc::now();
                let changes = purchase_request::ActiveModel {
                    status: Set(RequestStatus::Completed),
                    completion_notes: Set(notes),
                    completed_by: Set(Some(completed_by)),
                    completed_at: Set(Some(now)),
                    updated_at: Set(now),
                    ..Default::default()
                };
                save_request(txn, &request, changes).await
            })
        })
        .await;

        record_lifecycle("complete_request", result.is_ok());
        let request = result.map_err(|e| {
            warn!(request_id = %self.request_id, error = %e, "Completion refused");
            e
        })?;

        info!(request_id = %request.id, "Purchase request completed");
        event_sender.send_or_log(Event::RequestCompleted {
            request_id: request.id,
            requester_id: request.requester_id,
        });

        Ok(request)
    }
}
