use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::Actor,
    db::DbPool,
    entities::{item_budget, purchase_request, request_item, supplier},
    errors::ServiceError,
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateBudgetInput {
    pub supplier_id: Uuid,
    #[schema(value_type = String, example = "12.50")]
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateBudgetInput {
    #[schema(value_type = String, example = "11.90")]
    pub unit_price: Decimal,
}

fn require_positive(price: Decimal) -> Result<(), ServiceError> {
    if price <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "unit price must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Supplier quotations attached to request items.
#[derive(Clone)]
pub struct BudgetService {
    db_pool: Arc<DbPool>,
}

impl BudgetService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, actor, input))]
    pub async fn create_budget(
        &self,
        actor: &Actor,
        request_id: Uuid,
        item_id: Uuid,
        input: CreateBudgetInput,
    ) -> Result<item_budget::Model, ServiceError> {
        actor.require_admin()?;
        require_positive(input.unit_price)?;
        let db = self.db_pool.as_ref();

        request_item::Entity::find_by_id(item_id)
            .filter(request_item::Column::PurchaseRequestId.eq(request_id))
            .filter(request_item::Column::DeletedAt.is_null())
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "request item {} on purchase request {}",
                    item_id, request_id
                ))
            })?;
        supplier::Entity::find_by_id(input.supplier_id)
            .filter(supplier::Column::DeletedAt.is_null())
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::BadRequest(format!("supplier {} not found", input.supplier_id))
            })?;

        let now = Utc::now();
        let budget = item_budget::ActiveModel {
            id: Set(Uuid::new_v4()),
            purchase_request_id: Set(request_id),
            request_item_id: Set(item_id),
            supplier_id: Set(input.supplier_id),
            unit_price: Set(input.unit_price),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(db)
        .await?;

        info!(budget_id = %budget.id, item_id = %item_id, "Budget created");
        Ok(budget)
    }

    #[instrument(skip(self, actor))]
    pub async fn list_request_budgets(
        &self,
        actor: &Actor,
        request_id: Uuid,
    ) -> Result<Vec<item_budget::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        let request = purchase_request::Entity::find_by_id(request_id)
            .filter(purchase_request::Column::DeletedAt.is_null())
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase request {}", request_id)))?;
        actor.require_owner_or_admin(request.requester_id)?;

        let budgets = item_budget::Entity::find()
            .filter(item_budget::Column::PurchaseRequestId.eq(request.id))
            .filter(item_budget::Column::DeletedAt.is_null())
            .order_by_asc(item_budget::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(budgets)
    }

    #[instrument(skip(self, actor, input))]
    pub async fn update_budget(
        &self,
        actor: &Actor,
        budget_id: Uuid,
        input: UpdateBudgetInput,
    ) -> Result<item_budget::Model, ServiceError> {
        actor.require_admin()?;
        require_positive(input.unit_price)?;

        let budget = self.find_budget(budget_id).await?;
        let mut active: item_budget::ActiveModel = budget.into();
        active.unit_price = Set(input.unit_price);
        active.updated_at = Set(Utc::now());
        let budget = active.update(self.db_pool.as_ref()).await?;

        info!(budget_id = %budget.id, "Budget updated");
        Ok(budget)
    }

    #[instrument(skip(self, actor))]
    pub async fn delete_budget(&self, actor: &Actor, budget_id: Uuid) -> Result<(), ServiceError> {
        actor.require_admin()?;

        let budget = self.find_budget(budget_id).await?;
        let now = Utc::now();
        let mut active: item_budget::ActiveModel = budget.into();
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(self.db_pool.as_ref()).await?;

        info!(budget_id = %budget_id, "Budget deleted");
        Ok(())
    }

    async fn find_budget(&self, budget_id: Uuid) -> Result<item_budget::Model, ServiceError> {
        item_budget::Entity::find_by_id(budget_id)
            .filter(item_budget::Column::DeletedAt.is_null())
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("budget {}", budget_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn prices_must_be_positive() {
        assert!(require_positive(dec!(0.01)).is_ok());
        assert!(matches!(
            require_positive(Decimal::ZERO),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(require_positive(dec!(-3)).is_err());
    }
}
