use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{sea_query::Expr, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::Actor,
    commands::{
        support::{lock_request, save_request},
        Command,
    },
    db::{with_transaction, DbPool},
    entities::{purchase_request, request_item},
    errors::ServiceError,
    events::EventSender,
    metrics::record_lifecycle,
    models::RequestStatus,
};

/// Soft-deletes a request together with its items. Owners may only delete
/// while the request is still pending.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeletePurchaseRequestCommand {
    pub actor: Actor,
    pub request_id: Uuid,
}

#[async_trait]
impl Command for DeletePurchaseRequestCommand {
    type Result = ();

    #[instrument(skip(self, db_pool, _event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        _event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let actor = self.actor;
        let request_id = self.request_id;

        let result = with_transaction(db_pool.as_ref(), "delete_request", move |txn| {
            Box::pin(async move {
                let request = lock_request(txn, request_id).await?;
                actor.require_owner_or_admin(request.requester_id)?;
                if !actor.is_admin() && request.status != RequestStatus::Pending {
                    return Err(ServiceError::Conflict(
                        "only pending requests can be deleted by their owner".to_string(),
                    ));
                }

                let now = Utc::now();
                request_item::Entity::update_many()
                    .col_expr(request_item::Column::DeletedAt, Expr::value(now))
                    .filter(request_item::Column::PurchaseRequestId.eq(request_id))
                    .filter(request_item::Column::DeletedAt.is_null())
                    .exec(txn)
                    .await?;

                let changes = purchase_request::ActiveModel {
                    deleted_at: Set(Some(now)),
                    updated_at: Set(now),
                    ..Default::default()
                };
                save_request(txn, &request, changes).await?;
                Ok(())
            })
        })
        .await;

        record_lifecycle("delete_request", result.is_ok());
        result?;

        info!(request_id = %request_id, "Purchase request deleted");
        Ok(())
    }
}
