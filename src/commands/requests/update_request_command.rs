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

/// General edit of a request. Requesters may only change the observations of
/// their own request; admins may also set a status override and admin notes.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdatePurchaseRequestCommand {
    pub actor: Actor,
    pub request_id: Uuid,
    #[validate(length(max = 2000))]
    pub observations: Option<String>,
    pub status: Option<RequestStatus>,
    #[validate(length(max = 2000))]
    pub admin_notes: Option<String>,
}

impl UpdatePurchaseRequestCommand {
    fn touches_admin_fields(&self) -> bool {
        self.status.is_some() || non_blank(self.admin_notes.as_deref()).is_some()
    }
}

#[async_trait]
impl Command for UpdatePurchaseRequestCommand {
    type Result = purchase_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if !self.actor.is_admin() && self.touches_admin_fields() {
            return Err(ServiceError::Forbidden(
                "only administrators may change status or admin notes".to_string(),
            ));
        }
        if let Some(status) = self.status {
            if !status.is_manual_review_target() {
                return Err(ServiceError::ValidationError(
                    "status must be one of approved, partial, rejected".to_string(),
                ));
            }
        }

        let actor = self.actor;
        let request_id = self.request_id;
        let observations = non_blank(self.observations.as_deref());
        let status = self.status;
        let admin_notes = non_blank(self.admin_notes.as_deref());

        let result = with_transaction(db_pool.as_ref(), "update_request", move |txn| {
            Box::pin(async move {
                let request = lock_request(txn, request_id).await?;
                actor.require_owner_or_admin(request.requester_id)?;
                if status.is_some() && request.status == RequestStatus::Completed {
                    return Err(ServiceError::Conflict(
                        "request is completed; reopen it before changing its status".to_string(),
                    ));
                }

                let now = Utc::now();
                let mut changes = purchase_request::ActiveModel {
                    updated_at: Set(now),
                    ..Default::default()
                };

                if actor.is_admin() {
                    if let Some(status) = status {
                        changes.status = Set(status);
                        changes.reviewed_by = Set(Some(actor.user_id));
                        changes.reviewed_at = Set(Some(now));
                    }
                    if admin_notes.is_some() {
                        changes.admin_notes = Set(admin_notes);
                    }
                    if observations.is_some() {
                        changes.observations = Set(observations);
                    }
                } else if observations.is_some() {
                    changes.observations = Set(observations);
                }

                save_request(txn, &request, changes).await
            })
        })
        .await;

        record_lifecycle("update_request", result.is_ok());
        let request = result?;

        info!(request_id = %request.id, status = %request.status, "Purchase request updated");
        event_sender.send_or_log(Event::RequestUpdated {
            request_id: request.id,
            requester_id: request.requester_id,
            status: request.status,
        });

        Ok(request)
    }
}
