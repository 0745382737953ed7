use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::Actor,
    commands::{receipts::CreateReceiptCommand, Command},
    db::DbPool,
    entities::{item_receipt, product, purchase_request, request_item},
    errors::ServiceError,
    events::EventSender,
    models::{ItemStatus, ReceivingStatus},
};

/// Net units received for an item across its live receipts.
pub async fn net_received_for_item<C: ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
) -> Result<i64, ServiceError> {
    let receipts = item_receipt::Entity::find()
        .filter(item_receipt::Column::RequestItemId.eq(item_id))
        .filter(item_receipt::Column::DeletedAt.is_null())
        .all(conn)
        .await?;
    Ok(receipts.iter().map(item_receipt::Model::net_quantity).sum())
}

/// Delivery progress of one approved item.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ItemReceivingStatus {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity_ordered: i64,
    pub quantity_received: i64,
    /// Negative when more was received than ordered
    pub quantity_pending: i64,
    pub status: ReceivingStatus,
    pub last_received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReceivingSummary {
    pub total_items: usize,
    pub complete: usize,
    pub partial: usize,
    pub pending: usize,
    pub over_delivered: usize,
}

impl ReceivingSummary {
    fn count(&mut self, status: ReceivingStatus) {
        self.total_items += 1;
        match status {
            ReceivingStatus::Pending => self.pending += 1,
            ReceivingStatus::Partial => self.partial += 1,
            ReceivingStatus::Complete => self.complete += 1,
            ReceivingStatus::OverDelivered => self.over_delivered += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RequestReceivingStatus {
    pub request_id: Uuid,
    pub items: Vec<ItemReceivingStatus>,
    pub summary: ReceivingSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReceiptsSummary {
    pub total_receipts: usize,
    pub total_quantity: i64,
    pub total_rejected: i64,
    pub unique_suppliers: usize,
    pub first_receipt_date: Option<DateTime<Utc>>,
    pub last_receipt_date: Option<DateTime<Utc>>,
}

impl ReceiptsSummary {
    pub fn from_receipts(receipts: &[item_receipt::Model]) -> Self {
        let suppliers: HashSet<Uuid> = receipts.iter().filter_map(|r| r.supplier_id).collect();
        Self {
            total_receipts: receipts.len(),
            total_quantity: receipts
                .iter()
                .map(|r| i64::from(r.quantity_received))
                .sum(),
            total_rejected: receipts
                .iter()
                .map(|r| i64::from(r.rejected_quantity))
                .sum(),
            unique_suppliers: suppliers.len(),
            first_receipt_date: receipts.iter().map(|r| r.created_at).min(),
            last_receipt_date: receipts.iter().map(|r| r.created_at).max(),
        }
    }
}

/// Per-item rollup over an item's receipts.
pub fn item_progress(
    item: &request_item::Model,
    product_name: String,
    receipts: &[&item_receipt::Model],
) -> ItemReceivingStatus {
    let ordered = i64::from(item.quantity);
    let received: i64 = receipts.iter().map(|r| r.net_quantity()).sum();
    ItemReceivingStatus {
        item_id: item.id,
        product_id: item.product_id,
        product_name,
        quantity_ordered: ordered,
        quantity_received: received,
        quantity_pending: ordered - received,
        status: ReceivingStatus::classify(ordered, received),
        last_received_at: receipts.iter().map(|r| r.created_at).max(),
    }
}

/// Receipt recording and the read-side rollups over receipts.
#[derive(Clone)]
pub struct ReceivingService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ReceivingService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, command), fields(item_id = %command.item_id))]
    pub async fn create_receipt(
        &self,
        command: CreateReceiptCommand,
    ) -> Result<item_receipt::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    async fn visible_request(
        &self,
        actor: &Actor,
        request_id: Uuid,
    ) -> Result<purchase_request::Model, ServiceError> {
        let request = purchase_request::Entity::find_by_id(request_id)
            .filter(purchase_request::Column::DeletedAt.is_null())
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase request {}", request_id)))?;
        actor.require_owner_or_admin(request.requester_id)?;
        Ok(request)
    }

    /// Receipts of one item, newest first.
    #[instrument(skip(self, actor))]
    pub async fn list_item_receipts(
        &self,
        actor: &Actor,
        item_id: Uuid,
    ) -> Result<Vec<item_receipt::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        let item = request_item::Entity::find_by_id(item_id)
            .filter(request_item::Column::DeletedAt.is_null())
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("request item {}", item_id)))?;
        self.visible_request(actor, item.purchase_request_id).await?;

        let receipts = item_receipt::Entity::find()
            .filter(item_receipt::Column::RequestItemId.eq(item.id))
            .filter(item_receipt::Column::DeletedAt.is_null())
            .order_by_desc(item_receipt::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(receipts)
    }

    /// Delivery progress of every approved item of a request.
    #[instrument(skip(self, actor))]
    pub async fn get_receiving_status(
        &self,
        actor: &Actor,
        request_id: Uuid,
    ) -> Result<RequestReceivingStatus, ServiceError> {
        let db = self.db_pool.as_ref();
        let request = self.visible_request(actor, request_id).await?;

        let items = request_item::Entity::find()
            .filter(request_item::Column::PurchaseRequestId.eq(request.id))
            .filter(request_item::Column::Status.eq(ItemStatus::Approved))
            .filter(request_item::Column::DeletedAt.is_null())
            .order_by_asc(request_item::Column::CreatedAt)
            .all(db)
            .await?;

        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let names: HashMap<Uuid, String> = product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        let receipts = self.request_receipts(request.id).await?;
        let mut by_item: HashMap<Uuid, Vec<&item_receipt::Model>> = HashMap::new();
        for receipt in &receipts {
            by_item
                .entry(receipt.request_item_id)
                .or_default()
                .push(receipt);
        }

        let mut summary = ReceivingSummary::default();
        let progress: Vec<ItemReceivingStatus> = items
            .iter()
            .map(|item| {
                let name = names.get(&item.product_id).cloned().unwrap_or_default();
                let rows = by_item.get(&item.id).map(Vec::as_slice).unwrap_or(&[]);
                let status = item_progress(item, name, rows);
                summary.count(status.status);
                status
            })
            .collect();

        Ok(RequestReceivingStatus {
            request_id: request.id,
            items: progress,
            summary,
        })
    }

    /// Totals over every receipt recorded for a request.
    #[instrument(skip(self, actor))]
    pub async fn get_receipts_summary(
        &self,
        actor: &Actor,
        request_id: Uuid,
    ) -> Result<ReceiptsSummary, ServiceError> {
        let request = self.visible_request(actor, request_id).await?;
        let receipts = self.request_receipts(request.id).await?;
        Ok(ReceiptsSummary::from_receipts(&receipts))
    }

    async fn request_receipts(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<item_receipt::Model>, ServiceError> {
        let receipts = item_receipt::Entity::find()
            .filter(item_receipt::Column::PurchaseRequestId.eq(request_id))
            .filter(item_receipt::Column::DeletedAt.is_null())
            .order_by_asc(item_receipt::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await?;
        Ok(receipts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReceiptCondition;
    use chrono::Duration;

    fn item(quantity: i32) -> request_item::Model {
        let now = Utc::now();
        request_item::Model {
            id: Uuid::new_v4(),
            purchase_request_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity,
            status: ItemStatus::Approved,
            admin_notes: None,
            suspension_reason: None,
            deadline: None,
            version: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn receipt(
        item: &request_item::Model,
        received: i32,
        rejected: i32,
        supplier_id: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> item_receipt::Model {
        item_receipt::Model {
            id: Uuid::new_v4(),
            request_item_id: item.id,
            purchase_request_id: item.purchase_request_id,
            received_by: Uuid::new_v4(),
            quantity_received: received,
            rejected_quantity: rejected,
            receipt_condition: ReceiptCondition::Good,
            invoice_number: "NF-1".into(),
            invoice_date: None,
            lot_number: None,
            expiration_date: None,
            supplier_id,
            quality_checked: false,
            quality_notes: None,
            notes: None,
            attachment_path: None,
            created_at: at,
            updated_at: at,
            deleted_at: None,
        }
    }

    #[test]
    fn progress_nets_out_rejections() {
        let item = item(10);
        let t0 = Utc::now();
        let a = receipt(&item, 6, 1, None, t0);
        let b = receipt(&item, 3, 0, None, t0 + Duration::minutes(5));

        let status = item_progress(&item, "Paper".into(), &[&a, &b]);
        assert_eq!(status.quantity_received, 8);
        assert_eq!(status.quantity_pending, 2);
        assert_eq!(status.status, ReceivingStatus::Partial);
        assert_eq!(status.last_received_at, Some(b.created_at));
    }

    #[test]
    fn historical_over_delivery_is_reported_not_rejected() {
        let item = item(4);
        let a = receipt(&item, 6, 0, None, Utc::now());

        let status = item_progress(&item, "Toner".into(), &[&a]);
        assert_eq!(status.status, ReceivingStatus::OverDelivered);
        assert_eq!(status.quantity_pending, -2);
    }

    #[test]
    fn item_without_receipts_is_pending() {
        let item = item(3);
        let status = item_progress(&item, "Pens".into(), &[]);
        assert_eq!(status.status, ReceivingStatus::Pending);
        assert_eq!(status.last_received_at, None);
    }

    #[test]
    fn summary_counts_each_bucket() {
        let mut summary = ReceivingSummary::default();
        for s in [
            ReceivingStatus::Pending,
            ReceivingStatus::Complete,
            ReceivingStatus::Complete,
            ReceivingStatus::OverDelivered,
        ] {
            summary.count(s);
        }
        assert_eq!(
            summary,
            ReceivingSummary {
                total_items: 4,
                complete: 2,
                partial: 0,
                pending: 1,
                over_delivered: 1,
            }
        );
    }

    #[test]
    fn receipts_summary_counts_distinct_suppliers() {
        let item = item(50);
        let supplier = Some(Uuid::new_v4());
        let t0 = Utc::now();
        let rows = vec![
            receipt(&item, 10, 2, supplier, t0),
            receipt(&item, 5, 0, supplier, t0 + Duration::hours(1)),
            receipt(&item, 7, 1, None, t0 + Duration::hours(2)),
        ];

        let summary = ReceiptsSummary::from_receipts(&rows);
        assert_eq!(summary.total_receipts, 3);
        assert_eq!(summary.total_quantity, 22);
        assert_eq!(summary.total_rejected, 3);
        assert_eq!(summary.unique_suppliers, 1);
        assert_eq!(summary.first_receipt_date, Some(t0));
        assert_eq!(summary.last_receipt_date, Some(t0 + Duration::hours(2)));
    }

    #[test]
    fn empty_summary_has_no_dates() {
        assert_eq!(ReceiptsSummary::from_receipts(&[]), ReceiptsSummary::default());
    }
}
