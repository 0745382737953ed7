use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle status of a purchase request.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "partial")]
    Partial,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "completed")]
    Completed,
}

impl RequestStatus {
    /// Statuses an administrator may set directly, bypassing aggregation.
    pub fn is_manual_review_target(self) -> bool {
        matches!(self, Self::Approved | Self::Partial | Self::Rejected)
    }

    /// Whether a request in this status may be completed.
    pub fn is_completable(self) -> bool {
        matches!(self, Self::Approved | Self::Partial)
    }

    /// Whether deliveries may be recorded against items of a request in this status.
    pub fn accepts_receipts(self) -> bool {
        matches!(self, Self::Approved | Self::Partial | Self::Completed)
    }
}

/// Review status of a single request item.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "suspended")]
    Suspended,
}

impl ItemStatus {
    /// Statuses an item review may move an item into.
    pub fn is_review_target(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Items in these statuses make a request eligible for completion.
    pub fn counts_toward_completion(self) -> bool {
        matches!(self, Self::Approved | Self::Suspended)
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Priority {
    #[sea_orm(string_value = "urgent")]
    Urgent,
    #[sea_orm(string_value = "high")]
    High,
    #[default]
    #[sea_orm(string_value = "normal")]
    Normal,
    #[sea_orm(string_value = "low")]
    Low,
}

/// Physical condition reported when goods are received.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReceiptCondition {
    #[default]
    #[sea_orm(string_value = "good")]
    Good,
    #[sea_orm(string_value = "damaged")]
    Damaged,
    #[sea_orm(string_value = "partial_damage")]
    PartialDamage,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    #[sea_orm(string_value = "available")]
    Available,
    #[sea_orm(string_value = "discontinued")]
    Discontinued,
}

/// Delivery progress of an approved item, derived from its receipts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReceivingStatus {
    Pending,
    Partial,
    Complete,
    OverDelivered,
}

impl ReceivingStatus {
    pub fn classify(ordered: i64, received: i64) -> Self {
        if received <= 0 {
            Self::Pending
        } else if received < ordered {
            Self::Partial
        } else if received == ordered {
            Self::Complete
        } else {
            Self::OverDelivered
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_render_as_snake_case() {
        assert_eq!(RequestStatus::Completed.to_string(), "completed");
        assert_eq!(ReceiptCondition::PartialDamage.to_string(), "partial_damage");
        assert_eq!(ReceivingStatus::OverDelivered.to_string(), "over_delivered");
        assert_eq!(
            serde_json::to_value(ItemStatus::Suspended).unwrap(),
            serde_json::json!("suspended")
        );
    }

    #[test]
    fn receiving_status_buckets() {
        assert_eq!(ReceivingStatus::classify(10, 0), ReceivingStatus::Pending);
        assert_eq!(ReceivingStatus::classify(10, 4), ReceivingStatus::Partial);
        assert_eq!(ReceivingStatus::classify(10, 10), ReceivingStatus::Complete);
        assert_eq!(
            ReceivingStatus::classify(10, 12),
            ReceivingStatus::OverDelivered
        );
    }

    #[test]
    fn request_status_gates() {
        assert!(RequestStatus::Partial.is_completable());
        assert!(!RequestStatus::Rejected.is_completable());
        assert!(RequestStatus::Completed.accepts_receipts());
        assert!(!RequestStatus::Pending.accepts_receipts());
        assert!(!RequestStatus::Completed.is_manual_review_target());
    }
}
