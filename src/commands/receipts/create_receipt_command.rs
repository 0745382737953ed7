use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::Actor,
    commands::{
        support::{lock_item, non_blank, save_item},
        Command,
    },
    db::{with_transaction, DbPool},
    entities::{item_receipt, purchase_request, request_item, supplier},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::{record_lifecycle, RECEIPTS_RECORDED, RECEIPTS_REFUSED, RECEIPT_NET_UNITS},
    models::{ItemStatus, ReceiptCondition},
    services::receiving::net_received_for_item,
};

/// Records a delivery against an approved item.
///
/// Cumulative net receipts (received minus rejected) never exceed the ordered
/// quantity. The check and the insert run under a lock on the item row plus a
/// conditional bump of its version, so concurrent receipts for the same item
/// cannot both pass the check.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateReceiptCommand {
    pub actor: Actor,
    pub item_id: Uuid,
    #[validate(range(min = 1, message = "Quantity received must be at least 1"))]
    pub quantity_received: i32,
    #[validate(range(min = 0, message = "Rejected quantity cannot be negative"))]
    pub rejected_quantity: i32,
    #[validate(length(min = 1, max = 100, message = "Invoice number is required"))]
    pub invoice_number: String,
    pub invoice_date: Option<DateTime<Utc>>,
    #[validate(length(max = 100))]
    pub lot_number: Option<String>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub supplier_id: Option<Uuid>,
    pub receipt_condition: Option<ReceiptCondition>,
    pub quality_checked: bool,
    #[validate(length(max = 2000))]
    pub quality_notes: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Message for a receipt that would push net receipts past the order.
pub fn over_order_message(ordered: i32, already_received: i64, attempted: i32) -> String {
    format!(
        "Quantity exceeds order. Ordered: {}, Already received: {}, Trying to receive: {}",
        ordered, already_received, attempted
    )
}

#[async_trait]
impl Command for CreateReceiptCommand {
    type Result = item_receipt::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(item_id = %self.item_id, quantity = self.quantity_received))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        self.actor.require_admin()?;

        if self.invoice_number.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "invoice number is required".to_string(),
            ));
        }
        if self.rejected_quantity > self.quantity_received {
            RECEIPTS_REFUSED.with_label_values(&["rejected_exceeds_received"]).inc();
            return Err(ServiceError::ValidationError(
                "rejected quantity cannot exceed quantity received".to_string(),
            ));
        }

        let now = Utc::now();
        let receipt = item_receipt::ActiveModel {
            id: Set(Uuid::new_v4()),
            request_item_id: Set(self.item_id),
            purchase_request_id: Set(Uuid::nil()),
            received_by: Set(self.actor.user_id),
            quantity_received: Set(self.quantity_received),
            rejected_quantity: Set(self.rejected_quantity),
            receipt_condition: Set(self.receipt_condition.unwrap_or_default()),
            invoice_number: Set(self.invoice_number.trim().to_string()),
            invoice_date: Set(self.invoice_date),
            lot_number: Set(non_blank(self.lot_number.as_deref())),
            expiration_date: Set(self.expiration_date),
            supplier_id: Set(self.supplier_id),
            quality_checked: Set(self.quality_checked),
            quality_notes: Set(non_blank(self.quality_notes.as_deref())),
            notes: Set(non_blank(self.notes.as_deref())),
            attachment_path: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        };

        let item_id = self.item_id;
        let supplier_id = self.supplier_id;
        let received = self.quantity_received;
        let rejected = self.rejected_quantity;

        let result = with_transaction(db_pool.as_ref(), "create_receipt", move |txn| {
            Box::pin(async move {
                let item = lock_item(txn, item_id).await?;

                let request = purchase_request::Entity::find_by_id(item.purchase_request_id)
                    .filter(purchase_request::Column::DeletedAt.is_null())
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "purchase request {}",
                            item.purchase_request_id
                        ))
                    })?;

                if !request.status.accepts_receipts() {
                    RECEIPTS_REFUSED.with_label_values(&["request_status"]).inc();
                    return Err(ServiceError::Conflict(format!(
                        "cannot receive items of a request with status {}; allowed: approved, partial, completed",
                        request.status
                    )));
                }
                if item.status != ItemStatus::Approved {
                    RECEIPTS_REFUSED.with_label_values(&["item_status"]).inc();
                    return Err(ServiceError::Conflict(
                        "this item was not approved for purchase".to_string(),
                    ));
                }

                if let Some(supplier_id) = supplier_id {
                    supplier::Entity::find_by_id(supplier_id)
                        .filter(supplier::Column::DeletedAt.is_null())
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::BadRequest(format!("supplier {} not found", supplier_id))
                        })?;
                }

                let already = net_received_for_item(txn, item.id).await?;
                let after = already + i64::from(received) - i64::from(rejected);
                if after > i64::from(item.quantity) {
                    RECEIPTS_REFUSED.with_label_values(&["over_order"]).inc();
                    return Err(ServiceError::BadRequest(over_order_message(
                        item.quantity,
                        already,
                        received,
                    )));
                }

                // Version bump makes a racing receipt on the same item fail
                save_item(txn, &item, <request_item::ActiveModel as Default>::default()).await?;

                let mut receipt = receipt;
                receipt.purchase_request_id = Set(request.id);
                let receipt = receipt.insert(txn).await?;

                Ok((receipt, request.requester_id))
            })
        })
        .await;

        record_lifecycle("create_receipt", result.is_ok());
        let (receipt, requester_id) = result.map_err(|e| {
            warn!(item_id = %self.item_id, error = %e, "Receipt refused");
            e
        })?;

        RECEIPTS_RECORDED.inc();
        RECEIPT_NET_UNITS.inc_by(receipt.net_quantity().max(0) as u64);

        info!(
            receipt_id = %receipt.id,
            item_id = %receipt.request_item_id,
            net = receipt.net_quantity(),
            "Receipt recorded"
        );
        event_sender.send_or_log(Event::ItemReceived {
            item_id: receipt.request_item_id,
            request_id: receipt.purchase_request_id,
            requester_id,
        });

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_order_message_carries_the_numbers() {
        assert_eq!(
            over_order_message(10, 8, 3),
            "Quantity exceeds order. Ordered: 10, Already received: 8, Trying to receive: 3"
        );
    }
}
