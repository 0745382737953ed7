use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::ReceiptCondition;

/// Append-only record of a delivery against a request item.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "item_receipts")]
#[schema(as = ItemReceipt)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub request_item_id: Uuid,
    pub purchase_request_id: Uuid,
    pub received_by: Uuid,
    pub quantity_received: i32,
    pub rejected_quantity: i32,
    pub receipt_condition: ReceiptCondition,
    pub invoice_number: String,
    pub invoice_date: Option<DateTime<Utc>>,
    pub lot_number: Option<String>,
    pub expiration_date: Option<DateTime<Utc>>,
    /// Actual deliverer, which may differ from the quoted supplier
    pub supplier_id: Option<Uuid>,
    pub quality_checked: bool,
    pub quality_notes: Option<String>,
    pub notes: Option<String>,
    pub attachment_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn net_quantity(&self) -> i64 {
        i64::from(self.quantity_received) - i64::from(self.rejected_quantity)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::request_item::Entity",
        from = "Column::RequestItemId",
        to = "super::request_item::Column::Id"
    )]
    RequestItem,
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::SupplierId",
        to = "super::supplier::Column::Id"
    )]
    Supplier,
}

impl Related<super::request_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RequestItem.def()
    }
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
