use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::Actor,
    commands::support::non_blank,
    db::DbPool,
    entities::{product, request_item, sector, supplier, user},
    errors::ServiceError,
    models::ProductStatus,
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SectorInput {
    #[validate(length(min = 1, max = 100, message = "Sector name is required"))]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateSupplierInput {
    #[validate(length(min = 1, max = 200, message = "Supplier name is required"))]
    pub name: String,
    pub cnpj: Option<String>,
    #[validate(length(max = 200))]
    pub contact: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 2000))]
    pub observations: Option<String>,
}

/// Partial supplier update; absent fields stay untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateSupplierInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub cnpj: Option<String>,
    #[validate(length(max = 200))]
    pub contact: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 2000))]
    pub observations: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 200, message = "Product name is required"))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    /// Unit of measure, e.g. box, kg, litre
    #[validate(length(min = 1, max = 30, message = "Unit is required"))]
    pub unit: String,
    pub sector_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub unit: Option<String>,
    pub status: Option<ProductStatus>,
}

/// Digits of a CNPJ, dropping punctuation.
pub fn cnpj_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Checks length and both check digits of a CNPJ.
pub fn is_valid_cnpj(raw: &str) -> bool {
    let digits: Vec<u32> = cnpj_digits(raw)
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect();
    if digits.len() != 14 || digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    let check = |len: usize, mut weight: u32| {
        let sum: u32 = digits[..len]
            .iter()
            .map(|d| {
                let term = d * weight;
                weight = if weight == 2 { 9 } else { weight - 1 };
                term
            })
            .sum();
        match sum % 11 {
            r if r < 2 => 0,
            r => 11 - r,
        }
    };

    check(12, 5) == digits[12] && check(13, 6) == digits[13]
}

/// Renders a CNPJ as `XX.XXX.XXX/XXXX-XX`; other lengths pass through as digits.
pub fn format_cnpj(raw: &str) -> String {
    let d = cnpj_digits(raw);
    if d.len() != 14 {
        return d;
    }
    format!("{}.{}.{}/{}-{}", &d[..2], &d[2..5], &d[5..8], &d[8..12], &d[12..])
}

/// Sectors, suppliers and products.
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    // ---- sectors ----

    pub async fn list_sectors(&self) -> Result<Vec<sector::Model>, ServiceError> {
        let sectors = sector::Entity::find()
            .filter(sector::Column::DeletedAt.is_null())
            .order_by_asc(sector::Column::Name)
            .all(self.db_pool.as_ref())
            .await?;
        Ok(sectors)
    }

    pub async fn find_sector(&self, sector_id: Uuid) -> Result<sector::Model, ServiceError> {
        sector::Entity::find_by_id(sector_id)
            .filter(sector::Column::DeletedAt.is_null())
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sector {}", sector_id)))
    }

    async fn ensure_sector_name_free(
        &self,
        name: &str,
        except: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut query = sector::Entity::find()
            .filter(sector::Column::Name.eq(name))
            .filter(sector::Column::DeletedAt.is_null());
        if let Some(id) = except {
            query = query.filter(sector::Column::Id.ne(id));
        }
        if query.count(self.db_pool.as_ref()).await? > 0 {
            return Err(ServiceError::Conflict(format!(
                "a sector named '{}' already exists",
                name
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, actor))]
    pub async fn create_sector(
        &self,
        actor: &Actor,
        input: SectorInput,
    ) -> Result<sector::Model, ServiceError> {
        actor.require_admin()?;
        input.validate()?;
        let name = input.name.trim().to_string();
        self.ensure_sector_name_free(&name, None).await?;

        let now = Utc::now();
        let sector = sector::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(self.db_pool.as_ref())
        .await?;

        info!(sector_id = %sector.id, "Sector created");
        Ok(sector)
    }

    #[instrument(skip(self, actor))]
    pub async fn update_sector(
        &self,
        actor: &Actor,
        sector_id: Uuid,
        input: SectorInput,
    ) -> Result<sector::Model, ServiceError> {
        actor.require_admin()?;
        input.validate()?;
        let current = self.find_sector(sector_id).await?;
        let name = input.name.trim().to_string();
        self.ensure_sector_name_free(&name, Some(current.id)).await?;

        let mut active: sector::ActiveModel = current.into();
        active.name = Set(name);
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.db_pool.as_ref()).await?)
    }

    #[instrument(skip(self, actor))]
    pub async fn delete_sector(&self, actor: &Actor, sector_id: Uuid) -> Result<(), ServiceError> {
        actor.require_admin()?;
        let current = self.find_sector(sector_id).await?;
        let now = Utc::now();
        let mut active: sector::ActiveModel = current.into();
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(self.db_pool.as_ref()).await?;
        info!(sector_id = %sector_id, "Sector deleted");
        Ok(())
    }

    // ---- suppliers ----

    pub async fn list_suppliers(&self) -> Result<Vec<supplier::Model>, ServiceError> {
        let suppliers = supplier::Entity::find()
            .filter(supplier::Column::DeletedAt.is_null())
            .order_by_asc(supplier::Column::Name)
            .all(self.db_pool.as_ref())
            .await?;
        Ok(suppliers)
    }

    pub async fn get_supplier(&self, supplier_id: Uuid) -> Result<supplier::Model, ServiceError> {
        supplier::Entity::find_by_id(supplier_id)
            .filter(supplier::Column::DeletedAt.is_null())
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("supplier {}", supplier_id)))
    }

    /// Validates a CNPJ and checks no other live supplier has the same digits.
    async fn checked_cnpj(
        &self,
        raw: &str,
        except: Option<Uuid>,
    ) -> Result<Option<String>, ServiceError> {
        if raw.trim().is_empty() {
            return Ok(None);
        }
        if !is_valid_cnpj(raw) {
            return Err(ServiceError::ValidationError("invalid CNPJ".to_string()));
        }
        let digits = cnpj_digits(raw);
        let taken = supplier::Entity::find()
            .filter(supplier::Column::DeletedAt.is_null())
            .filter(supplier::Column::Cnpj.is_not_null())
            .all(self.db_pool.as_ref())
            .await?
            .into_iter()
            .filter(|s| Some(s.id) != except)
            .any(|s| s.cnpj.as_deref().map(cnpj_digits).as_deref() == Some(digits.as_str()));
        if taken {
            return Err(ServiceError::Conflict(
                "CNPJ already registered for another supplier".to_string(),
            ));
        }
        Ok(Some(format_cnpj(&digits)))
    }

    #[instrument(skip(self, actor, input))]
    pub async fn create_supplier(
        &self,
        actor: &Actor,
        input: CreateSupplierInput,
    ) -> Result<supplier::Model, ServiceError> {
        actor.require_admin()?;
        input.validate()?;
        let cnpj = match input.cnpj.as_deref() {
            Some(raw) => self.checked_cnpj(raw, None).await?,
            None => None,
        };

        let now = Utc::now();
        let supplier = supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            cnpj: Set(cnpj),
            contact: Set(non_blank(input.contact.as_deref())),
            phone: Set(non_blank(input.phone.as_deref())),
            email: Set(non_blank(input.email.as_deref())),
            observations: Set(non_blank(input.observations.as_deref())),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(self.db_pool.as_ref())
        .await?;

        info!(supplier_id = %supplier.id, "Supplier created");
        Ok(supplier)
    }

    #[instrument(skip(self, actor, input))]
    pub async fn update_supplier(
        &self,
        actor: &Actor,
        supplier_id: Uuid,
        input: UpdateSupplierInput,
    ) -> Result<supplier::Model, ServiceError> {
        actor.require_admin()?;
        input.validate()?;
        let current = self.get_supplier(supplier_id).await?;

        let mut active: supplier::ActiveModel = current.clone().into();
        if let Some(raw) = input.cnpj.as_deref() {
            active.cnpj = Set(self.checked_cnpj(raw, Some(current.id)).await?);
        }
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(contact) = input.contact {
            active.contact = Set(non_blank(Some(&contact)));
        }
        if let Some(phone) = input.phone {
            active.phone = Set(non_blank(Some(&phone)));
        }
        if let Some(email) = input.email {
            active.email = Set(non_blank(Some(&email)));
        }
        if let Some(observations) = input.observations {
            active.observations = Set(non_blank(Some(&observations)));
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.db_pool.as_ref()).await?)
    }

    #[instrument(skip(self, actor))]
    pub async fn delete_supplier(
        &self,
        actor: &Actor,
        supplier_id: Uuid,
    ) -> Result<(), ServiceError> {
        actor.require_admin()?;
        let current = self.get_supplier(supplier_id).await?;
        let now = Utc::now();
        let mut active: supplier::ActiveModel = current.into();
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(self.db_pool.as_ref()).await?;
        info!(supplier_id = %supplier_id, "Supplier deleted");
        Ok(())
    }

    // ---- products ----

    async fn sector_of(&self, actor: &Actor) -> Result<Uuid, ServiceError> {
        let user = user::Entity::find_by_id(actor.user_id)
            .filter(user::Column::DeletedAt.is_null())
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("user no longer exists".to_string()))?;
        Ok(user.sector_id)
    }

    async fn find_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(product_id)
            .filter(product::Column::DeletedAt.is_null())
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", product_id)))
    }

    /// Requesters only touch products of their own sector.
    async fn require_product_access(
        &self,
        actor: &Actor,
        product: &product::Model,
    ) -> Result<(), ServiceError> {
        if !actor.is_admin() && self.sector_of(actor).await? != product.sector_id {
            return Err(ServiceError::Forbidden(
                "product belongs to another sector".to_string(),
            ));
        }
        Ok(())
    }

    /// Admins see the whole catalog; requesters the available products of their sector.
    #[instrument(skip(self, actor))]
    pub async fn list_products(&self, actor: &Actor) -> Result<Vec<product::Model>, ServiceError> {
        let mut query = product::Entity::find().filter(product::Column::DeletedAt.is_null());
        if !actor.is_admin() {
            let sector_id = self.sector_of(actor).await?;
            query = query
                .filter(product::Column::SectorId.eq(sector_id))
                .filter(product::Column::Status.eq(ProductStatus::Available));
        }
        let products = query
            .order_by_asc(product::Column::Name)
            .all(self.db_pool.as_ref())
            .await?;
        Ok(products)
    }

    #[instrument(skip(self, actor))]
    pub async fn get_product(
        &self,
        actor: &Actor,
        product_id: Uuid,
    ) -> Result<product::Model, ServiceError> {
        let product = self.find_product(product_id).await?;
        self.require_product_access(actor, &product).await?;
        Ok(product)
    }

    #[instrument(skip(self, actor, input))]
    pub async fn create_product(
        &self,
        actor: &Actor,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        if !actor.is_admin() && self.sector_of(actor).await? != input.sector_id {
            return Err(ServiceError::Forbidden(
                "products can only be created for your own sector".to_string(),
            ));
        }
        self.find_sector(input.sector_id)
            .await
            .map_err(|_| ServiceError::BadRequest(format!("sector {} not found", input.sector_id)))?;

        let now = Utc::now();
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            description: Set(non_blank(input.description.as_deref())),
            unit: Set(input.unit.trim().to_string()),
            sector_id: Set(input.sector_id),
            status: Set(ProductStatus::Available),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(self.db_pool.as_ref())
        .await?;

        info!(product_id = %product.id, sector_id = %product.sector_id, "Product created");
        Ok(product)
    }

    #[instrument(skip(self, actor, input))]
    pub async fn update_product(
        &self,
        actor: &Actor,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        let current = self.find_product(product_id).await?;
        self.require_product_access(actor, &current).await?;
        if input.status.is_some() && !actor.is_admin() {
            return Err(ServiceError::Forbidden(
                "only administrators may change a product's status".to_string(),
            ));
        }

        let mut active: product::ActiveModel = current.into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = input.description {
            active.description = Set(non_blank(Some(&description)));
        }
        if let Some(unit) = input.unit {
            active.unit = Set(unit.trim().to_string());
        }
        if let Some(status) = input.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.db_pool.as_ref()).await?)
    }

    /// Soft-deletes a product that no request item references.
    #[instrument(skip(self, actor))]
    pub async fn delete_product(&self, actor: &Actor, product_id: Uuid) -> Result<(), ServiceError> {
        let current = self.find_product(product_id).await?;
        self.require_product_access(actor, &current).await?;

        let references = request_item::Entity::find()
            .filter(request_item::Column::ProductId.eq(current.id))
            .count(self.db_pool.as_ref())
            .await?;
        if references > 0 {
            return Err(ServiceError::Conflict(
                "product is referenced by purchase requests".to_string(),
            ));
        }

        let now = Utc::now();
        let mut active: product::ActiveModel = current.into();
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(self.db_pool.as_ref()).await?;
        info!(product_id = %product_id, "Product deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("11.222.333/0001-81", true)]
    #[case("11222333000181", true)]
    #[case("11.222.333/0001-82", false)]
    #[case("00.000.000/0000-00", false)]
    #[case("1122233300018", false)]
    #[case("", false)]
    fn cnpj_check_digits(#[case] raw: &str, #[case] valid: bool) {
        assert_eq!(is_valid_cnpj(raw), valid);
    }

    #[test]
    fn cnpj_formatting_normalizes_punctuation() {
        assert_eq!(format_cnpj("11222333000181"), "11.222.333/0001-81");
        assert_eq!(format_cnpj("11.222.333/0001-81"), "11.222.333/0001-81");
        assert_eq!(format_cnpj("12-34"), "1234");
        assert_eq!(cnpj_digits("11.222.333/0001-81"), "11222333000181");
    }

    #[test]
    fn supplier_email_is_validated() {
        let input = CreateSupplierInput {
            name: "Papelaria Central".into(),
            cnpj: None,
            contact: None,
            phone: None,
            email: Some("not-an-email".into()),
            observations: None,
        };
        assert!(input.validate().is_err());
    }
}
