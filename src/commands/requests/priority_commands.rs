//! Admin priority controls: set, remove and the urgent toggle.

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
    models::Priority,
};

pub const DEFAULT_URGENT_NOTE: &str = "Marked as urgent";

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SetPriorityCommand {
    pub actor: Actor,
    pub request_id: Uuid,
    pub priority: Priority,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[async_trait]
impl Command for SetPriorityCommand {
    type Result = purchase_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id, priority = %self.priority))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        self.actor.require_admin()?;

        let request_id = self.request_id;
        let priority = self.priority;
        let admin = self.actor.user_id;
        let notes = non_blank(self.notes.as_deref());

        let result = with_transaction(db_pool.as_ref(), "set_priority", move |txn| {
            Box::pin(async move {
                let request = lock_request(txn, request_id).await?;
                let now = Utc::now();
                let changes = purchase_request::ActiveModel {
                    priority: Set(priority),
                    priority_by: Set(Some(admin)),
                    priority_at: Set(Some(now)),
                    priority_notes: Set(notes),
                    updated_at: Set(now),
                    ..Default::default()
                };
                save_request(txn, &request, changes).await
            })
        })
        .await;

        record_lifecycle("set_priority", result.is_ok());
        let request = result?;

        info!(request_id = %request.id, priority = %request.priority, "Priority updated");
        event_sender.send_or_log(Event::PriorityUpdated {
            request_id: request.id,
            requester_id: request.requester_id,
            priority: request.priority,
        });

        Ok(request)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemovePriorityCommand {
    pub actor: Actor,
    pub request_id: Uuid,
}

fn cleared_priority() -> purchase_request::ActiveModel {
    purchase_request::ActiveModel {
        priority: Set(Priority::Normal),
        priority_by: Set(None),
        priority_at: Set(None),
        priority_notes: Set(None),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
}

#[async_trait]
impl Command for RemovePriorityCommand {
    type Result = purchase_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.actor.require_admin()?;
        let request_id = self.request_id;

        let result = with_transaction(db_pool.as_ref(), "remove_priority", move |txn| {
            Box::pin(async move {
                let request = lock_request(txn, request_id).await?;
                save_request(txn, &request, cleared_priority()).await
            })
        })
        .await;

        record_lifecycle("remove_priority", result.is_ok());
        let request = result?;

        info!(request_id = %request.id, "Priority removed");
        event_sender.send_or_log(Event::PriorityRemoved {
            request_id: request.id,
            requester_id: request.requester_id,
        });

        Ok(request)
    }
}

/// Flips between `urgent` and `normal`. Any non-urgent priority, including
/// `high` and `low`, becomes `urgent`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleUrgentCommand {
    pub actor: Actor,
    pub request_id: Uuid,
}

#[async_trait]
impl Command for ToggleUrgentCommand {
    type Result = purchase_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.actor.require_admin()?;
        let request_id = self.request_id;
        let admin = self.actor.user_id;

        let result = with_transaction(db_pool.as_ref(), "toggle_urgent", move |txn| {
            Box::pin(async move {
                let request = lock_request(txn, request_id).await?;

                let changes = if request.priority == Priority::Urgent {
                    cleared_priority()
                } else {
                    let now = Utc::now();
                    let notes = non_blank(request.priority_notes.as_deref())
                        .unwrap_or_else(|| DEFAULT_URGENT_NOTE.to_string());
                    purchase_request::ActiveModel {
                        priority: Set(Priority::Urgent),
                        priority_by: Set(Some(admin)),
                        priority_at: Set(Some(now)),
                        priority_notes: Set(Some(notes)),
                        updated_at: Set(now),
                        ..Default::default()
                    }
                };
                save_request(txn, &request, changes).await
            })
        })
        .await;

        record_lifecycle("toggle_urgent", result.is_ok());
        let request = result?;

        let event = if request.priority == Priority::Urgent {
            Event::MarkedUrgent {
                request_id: request.id,
                requester_id: request.requester_id,
            }
        } else {
            Event::MarkedNormal {
                request_id: request.id,
                requester_id: request.requester_id,
            }
        };
        info!(request_id = %request.id, priority = %request.priority, "Urgency toggled");
        event_sender.send_or_log(event);

        Ok(request)
    }
}
