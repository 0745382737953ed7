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
        support::{lock_request, save_request},
        Command,
    },
    db::{with_transaction, DbPool},
    entities::purchase_request,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::record_lifecycle,
    models::RequestStatus,
};

/// Moves a completed request back to `approved`. The target is fixed and
/// does not depend on the item mix.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ReopenRequestCommand {
    pub actor: Actor,
    pub request_id: Uuid,
}

#[async_trait]
impl Command for ReopenRequestCommand {
    type Result = purchase_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.actor.require_admin()?;
        let request_id = self.request_id;

        let result = with_transaction(db_pool.as_ref(), "reopen_request", move |txn| {
            Box::pin(async move {
                let request = lock_request(txn, request_id).await?;
                if request.status != RequestStatus::Completed {
                    return Err(ServiceError::Conflict(format!(
                        "only completed requests can be reopened, found {}",
                        request.status
                    )));
                }

                let changes = purchase_request::ActiveModel {
                    status: Set(RequestStatus::Approved),
                    completion_notes: Set(None),
                    completed_by: Set(None),
                    completed_at: Set(None),
                    updated_at: Set(Utc::now()),
                    ..Default::default()
                };
                save_request(txn, &request, changes).await
            })
        })
        .await;

        record_lifecycle("reopen_request", result.is_ok());
        let request = result?;

        info!(request_id = %request.id, "Purchase request reopened");
        event_sender.send_or_log(Event::RequestReopened {
            request_id: request.id,
            requester_id: request.requester_id,
        });

        Ok(request)
    }
}
