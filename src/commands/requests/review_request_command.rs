use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::Actor,
    commands::{
        support::{lock_request, non_blank, save_request},
        Command,
    },
    db::{with_transaction, DbPool},
    entities::purchase_request,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::record_lifecycle,
    models::RequestStatus,
};

/// Manual override of a request's status. Item statuses are not consulted;
/// the next item review recomputes and replaces this value.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ReviewRequestCommand {
    pub actor: Actor,
    pub request_id: Uuid,
    pub status: RequestStatus,
    #[validate(length(max = 2000))]
    pub admin_notes: Option<String>,
}

#[async_trait]
impl Command for ReviewRequestCommand {
    type Result = purchase_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id, status = %self.status))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        self.actor.require_admin()?;

        if !self.status.is_manual_review_target() {
            return Err(ServiceError::ValidationError(
                "status must be one of approved, partial, rejected".to_string(),
            ));
        }

        let request_id = self.request_id;
        let status = self.status;
        let reviewer = self.actor.user_id;
        let admin_notes = non_blank(self.admin_notes.as_deref());

        let result = with_transaction(db_pool.as_ref(), "review_request", move |txn| {
            Box::pin(async move {
                let request = lock_request(txn, request_id).await?;
                if request.status == RequestStatus::Completed {
                    return Err(ServiceError::Conflict(
                        "request is completed; reopen it before changing its status".to_string(),
                    ));
                }
                let now = Utc::now();
                let changes = purchase_request::ActiveModel {
                    status: Set(status),
                    admin_notes: Set(admin_notes),
                    reviewed_by: Set(Some(reviewer)),
                    reviewed_at: Set(Some(now)),
                    updated_at: Set(now),
                    ..Default::default()
                };
                save_request(txn, &request, changes).await
            })
        })
        .await;

        record_lifecycle("review_request", result.is_ok());
        let request = result?;

        info!(request_id = %request.id, status = %request.status, "Purchase request reviewed");
        event_sender.send_or_log(Event::RequestReviewed {
            request_id: request.id,
            requester_id: request.requester_id,
            status: request.status,
        });

        Ok(request)
    }
}
