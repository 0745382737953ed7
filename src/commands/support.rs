//! Row loading and versioned writes shared by the lifecycle commands.

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use tracing::warn;
use uuid::Uuid;

use crate::entities::{product, purchase_request, request_item};
use crate::errors::ServiceError;
use crate::models::{ItemStatus, RequestStatus};
use crate::services::request_status::require_request_status;

/// Loads a live request row, locking it for the rest of the transaction.
/// Backends without row locks (SQLite) serialize writers instead.
pub(crate) async fn lock_request<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
) -> Result<purchase_request::Model, ServiceError> {
    purchase_request::Entity::find_by_id(request_id)
        .filter(purchase_request::Column::DeletedAt.is_null())
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("purchase request {}", request_id)))
}

/// Reads an item without locking; used to find the request to lock first.
pub(crate) async fn find_item<C: ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
) -> Result<request_item::Model, ServiceError> {
    request_item::Entity::find_by_id(item_id)
        .filter(request_item::Column::DeletedAt.is_null())
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("request item {}", item_id)))
}

/// Locks an item row. Callers that also lock the request lock it first.
pub(crate) async fn lock_item<C: ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
) -> Result<request_item::Model, ServiceError> {
    request_item::Entity::find_by_id(item_id)
        .filter(request_item::Column::DeletedAt.is_null())
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("request item {}", item_id)))
}

/// Loads an item and checks it belongs to the given request.
pub(crate) async fn lock_item_of<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
    item_id: Uuid,
) -> Result<request_item::Model, ServiceError> {
    let item = lock_item(conn, item_id).await?;
    if item.purchase_request_id != request_id {
        return Err(ServiceError::NotFound(format!(
            "request item {} in purchase request {}",
            item_id, request_id
        )));
    }
    Ok(item)
}

pub(crate) async fn live_items<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
) -> Result<Vec<request_item::Model>, ServiceError> {
    Ok(request_item::Entity::find()
        .filter(request_item::Column::PurchaseRequestId.eq(request_id))
        .filter(request_item::Column::DeletedAt.is_null())
        .order_by_asc(request_item::Column::CreatedAt)
        .all(conn)
        .await?)
}

/// Recomputes a request's status from its live items.
pub(crate) async fn aggregate_status<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
) -> Result<RequestStatus, ServiceError> {
    let statuses: Vec<ItemStatus> = live_items(conn, request_id)
        .await?
        .into_iter()
        .map(|item| item.status)
        .collect();
    require_request_status(statuses)
}

/// Writes `changes` to the request only if its version is still the one that
/// was read, bumping the version. A lost race surfaces as
/// `ConcurrentModification` and the caller's transaction rolls back.
pub(crate) async fn save_request<C: ConnectionTrait>(
    conn: &C,
    current: &purchase_request::Model,
    mut changes: purchase_request::ActiveModel,
) -> Result<purchase_request::Model, ServiceError> {
    changes.version = Set(current.version + 1);

    let result = purchase_request::Entity::update_many()
        .set(changes)
        .filter(purchase_request::Column::Id.eq(current.id))
        .filter(purchase_request::Column::Version.eq(current.version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        warn!(request_id = %current.id, version = current.version, "purchase request changed concurrently");
        return Err(ServiceError::ConcurrentModification(current.id));
    }

    purchase_request::Entity::find_by_id(current.id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("purchase request {}", current.id)))
}

pub(crate) async fn save_item<C: ConnectionTrait>(
    conn: &C,
    current: &request_item::Model,
    mut changes: request_item::ActiveModel,
) -> Result<request_item::Model, ServiceError> {
    changes.version = Set(current.version + 1);
    changes.updated_at = Set(Utc::now());

    let result = request_item::Entity::update_many()
        .set(changes)
        .filter(request_item::Column::Id.eq(current.id))
        .filter(request_item::Column::Version.eq(current.version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        warn!(item_id = %current.id, version = current.version, "request item changed concurrently");
        return Err(ServiceError::ConcurrentModification(current.id));
    }

    request_item::Entity::find_by_id(current.id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("request item {}", current.id)))
}

/// Tombstones an item with the same version check as [`save_item`].
pub(crate) async fn tombstone_item<C: ConnectionTrait>(
    conn: &C,
    current: &request_item::Model,
) -> Result<(), ServiceError> {
    let now = Utc::now();
    let result = request_item::Entity::update_many()
        .col_expr(request_item::Column::DeletedAt, Expr::value(now))
        .col_expr(request_item::Column::UpdatedAt, Expr::value(now))
        .col_expr(
            request_item::Column::Version,
            Expr::value(current.version + 1),
        )
        .filter(request_item::Column::Id.eq(current.id))
        .filter(request_item::Column::Version.eq(current.version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(current.id));
    }
    Ok(())
}

/// Checks a product can be ordered from the given sector.
pub(crate) async fn orderable_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    sector_id: Uuid,
) -> Result<product::Model, ServiceError> {
    let product = product::Entity::find_by_id(product_id)
        .filter(product::Column::DeletedAt.is_null())
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::BadRequest(format!("product {} not found", product_id)))?;

    if !product.is_orderable_in(sector_id) {
        return Err(ServiceError::BadRequest(format!(
            "product {} is not available for this sector",
            product_id
        )));
    }
    Ok(product)
}

/// Trims a free-text field, mapping blank input to `None`.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::non_blank;

    #[test]
    fn blank_text_becomes_none() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(Some(" late ")), Some("late".to_string()));
    }
}
