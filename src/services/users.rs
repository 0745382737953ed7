use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{
        password::{hash_password, verify_password},
        Actor, AuthError, AuthService,
    },
    db::DbPool,
    entities::{purchase_request, sector, user},
    errors::ServiceError,
    metrics::AUTH_FAILURES,
    models::{RequestStatus, Role},
};

const WEAK_PASSWORDS: [&str; 5] = ["123456", "password", "123123", "admin", "qwerty"];

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    /// Token lifetime in seconds
    pub expires_in: u64,
    pub user: user::Model,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateUserInput {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, message = "Password must have at least 6 characters"))]
    pub password: String,
    pub role: Role,
    pub sector_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserInput {
    #[validate(length(min = 2, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 6))]
    pub password: Option<String>,
    pub role: Option<Role>,
    pub sector_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileInput {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordInput {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 6, message = "New password must have at least 6 characters"))]
    pub new_password: String,
    pub confirm_password: String,
}

/// Rejects passwords from the well-known weak list.
pub fn check_password_strength(password: &str) -> Result<(), ServiceError> {
    if WEAK_PASSWORDS.contains(&password) {
        return Err(ServiceError::ValidationError(
            "password is too simple; choose a stronger one".to_string(),
        ));
    }
    Ok(())
}

/// Accounts, login and the caller's own profile.
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    auth: Arc<AuthService>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>, auth: Arc<AuthService>) -> Self {
        Self { db_pool, auth }
    }

    /// Exchanges credentials for a token. Unknown emails and wrong passwords
    /// fail the same way.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AuthError> {
        request
            .validate()
            .map_err(|_| AuthError::InvalidCredentials)?;
        let db = self.db_pool.as_ref();

        let account = user::Entity::find()
            .filter(user::Column::Email.eq(request.email.trim().to_lowercase()))
            .filter(user::Column::DeletedAt.is_null())
            .one(db)
            .await
            .map_err(|e| AuthError::InternalError(e.to_string()))?;

        let account = match account {
            Some(account) if verify_password(&request.password, &account.password_hash) => account,
            _ => {
                AUTH_FAILURES.with_label_values(&["invalid_credentials"]).inc();
                warn!("Login rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let sector = sector::Entity::find_by_id(account.sector_id)
            .one(db)
            .await
            .map_err(|e| AuthError::InternalError(e.to_string()))?
            .ok_or_else(|| AuthError::InternalError("user sector missing".to_string()))?;

        let token = self.auth.issue_token(&account, &sector)?;
        info!(user_id = %account.id, "User logged in");
        Ok(LoginResponse {
            token,
            expires_in: self.auth.token_expiration().as_secs(),
            user: account,
        })
    }

    async fn find_user(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(user_id)
            .filter(user::Column::DeletedAt.is_null())
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", user_id)))
    }

    async fn require_sector(&self, sector_id: Uuid) -> Result<(), ServiceError> {
        sector::Entity::find_by_id(sector_id)
            .filter(sector::Column::DeletedAt.is_null())
            .one(self.db_pool.as_ref())
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::BadRequest(format!("sector {} not found", sector_id)))
    }

    async fn require_email_free(&self, email: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .filter(user::Column::DeletedAt.is_null());
        if let Some(id) = except {
            query = query.filter(user::Column::Id.ne(id));
        }
        if query.count(self.db_pool.as_ref()).await? > 0 {
            return Err(ServiceError::Conflict(format!(
                "email {} is already in use",
                email
            )));
        }
        Ok(())
    }

    async fn admin_count(&self) -> Result<u64, ServiceError> {
        Ok(user::Entity::find()
            .filter(user::Column::Role.eq(Role::Admin))
            .filter(user::Column::DeletedAt.is_null())
            .count(self.db_pool.as_ref())
            .await?)
    }

    #[instrument(skip(self, actor))]
    pub async fn list_users(&self, actor: &Actor) -> Result<Vec<user::Model>, ServiceError> {
        actor.require_admin()?;
        let users = user::Entity::find()
            .filter(user::Column::DeletedAt.is_null())
            .order_by_asc(user::Column::Name)
            .all(self.db_pool.as_ref())
            .await?;
        Ok(users)
    }

    #[instrument(skip(self, actor))]
    pub async fn get_user(&self, actor: &Actor, user_id: Uuid) -> Result<user::Model, ServiceError> {
        if actor.user_id != user_id {
            actor.require_admin()?;
        }
        self.find_user(user_id).await
    }

    /// Inserts an account without a caller; used by the admin CLI to seed the first admin.
    pub async fn insert_user(&self, input: CreateUserInput) -> Result<user::Model, ServiceError> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();
        self.require_email_free(&email, None).await?;
        self.require_sector(input.sector_id).await?;

        let now = Utc::now();
        let account = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            email: Set(email),
            password_hash: Set(hash_password(&input.password)?),
            role: Set(input.role),
            sector_id: Set(input.sector_id),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(self.db_pool.as_ref())
        .await?;

        info!(user_id = %account.id, role = %account.role, "User created");
        Ok(account)
    }

    #[instrument(skip(self, actor, input))]
    pub async fn create_user(
        &self,
        actor: &Actor,
        input: CreateUserInput,
    ) -> Result<user::Model, ServiceError> {
        actor.require_admin()?;
        self.insert_user(input).await
    }

    #[instrument(skip(self, actor, input))]
    pub async fn update_user(
        &self,
        actor: &Actor,
        user_id: Uuid,
        input: UpdateUserInput,
    ) -> Result<user::Model, ServiceError> {
        actor.require_admin()?;
        if actor.user_id == user_id {
            return Err(ServiceError::Forbidden(
                "use the profile endpoints to edit your own account".to_string(),
            ));
        }
        input.validate()?;
        let current = self.find_user(user_id).await?;

        if current.is_admin()
            && matches!(input.role, Some(role) if role != Role::Admin)
            && self.admin_count().await? <= 1
        {
            return Err(ServiceError::Conflict(
                "the last administrator cannot be demoted".to_string(),
            ));
        }

        let mut active: user::ActiveModel = current.clone().into();
        if let Some(email) = input.email {
            let email = email.trim().to_lowercase();
            self.require_email_free(&email, Some(current.id)).await?;
            active.email = Set(email);
        }
        if let Some(sector_id) = input.sector_id {
            self.require_sector(sector_id).await?;
            active.sector_id = Set(sector_id);
        }
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(role) = input.role {
            active.role = Set(role);
        }
        if let Some(password) = input.password.filter(|p| !p.is_empty()) {
            active.password_hash = Set(hash_password(&password)?);
        }
        active.updated_at = Set(Utc::now());
        let account = active.update(self.db_pool.as_ref()).await?;

        info!(user_id = %account.id, "User updated");
        Ok(account)
    }

    /// Soft-deletes an account that has no open requests.
    #[instrument(skip(self, actor))]
    pub async fn delete_user(&self, actor: &Actor, user_id: Uuid) -> Result<(), ServiceError> {
        actor.require_admin()?;
        if actor.user_id == user_id {
            return Err(ServiceError::Forbidden(
                "you cannot delete your own account".to_string(),
            ));
        }
        let current = self.find_user(user_id).await?;
        if current.is_admin() && self.admin_count().await? <= 1 {
            return Err(ServiceError::Conflict(
                "the last administrator cannot be deleted".to_string(),
            ));
        }

        let open_requests = purchase_request::Entity::find()
            .filter(purchase_request::Column::RequesterId.eq(current.id))
            .filter(purchase_request::Column::DeletedAt.is_null())
            .filter(
                purchase_request::Column::Status
                    .is_not_in([RequestStatus::Completed, RequestStatus::Rejected]),
            )
            .count(self.db_pool.as_ref())
            .await?;
        if open_requests > 0 {
            return Err(ServiceError::Conflict(format!(
                "user has {} open purchase requests",
                open_requests
            )));
        }

        let now = Utc::now();
        let mut active: user::ActiveModel = current.into();
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(self.db_pool.as_ref()).await?;
        info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    #[instrument(skip(self, actor))]
    pub async fn promote_to_admin(
        &self,
        actor: &Actor,
        user_id: Uuid,
    ) -> Result<user::Model, ServiceError> {
        actor.require_admin()?;
        let current = self.find_user(user_id).await?;
        if current.is_admin() {
            return Err(ServiceError::Conflict(
                "user is already an administrator".to_string(),
            ));
        }
        let mut active: user::ActiveModel = current.into();
        active.role = Set(Role::Admin);
        active.updated_at = Set(Utc::now());
        let account = active.update(self.db_pool.as_ref()).await?;
        info!(user_id = %account.id, "User promoted to administrator");
        Ok(account)
    }

    pub async fn get_profile(&self, actor: &Actor) -> Result<user::Model, ServiceError> {
        self.find_user(actor.user_id).await
    }

    #[instrument(skip(self, actor, input))]
    pub async fn update_profile(
        &self,
        actor: &Actor,
        input: UpdateProfileInput,
    ) -> Result<user::Model, ServiceError> {
        input.validate()?;
        let current = self.find_user(actor.user_id).await?;
        let mut active: user::ActiveModel = current.into();
        active.name = Set(input.name.trim().to_string());
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.db_pool.as_ref()).await?)
    }

    #[instrument(skip(self, actor, input))]
    pub async fn change_password(
        &self,
        actor: &Actor,
        input: ChangePasswordInput,
    ) -> Result<(), ServiceError> {
        input.validate()?;
        if input.new_password != input.confirm_password {
            return Err(ServiceError::ValidationError(
                "new password and confirmation do not match".to_string(),
            ));
        }
        check_password_strength(&input.new_password)?;

        let current = self.find_user(actor.user_id).await?;
        if !verify_password(&input.current_password, &current.password_hash) {
            return Err(ServiceError::BadRequest(
                "current password is incorrect".to_string(),
            ));
        }

        let mut active: user::ActiveModel = current.into();
        active.password_hash = Set(hash_password(&input.new_password)?);
        active.updated_at = Set(Utc::now());
        active.update(self.db_pool.as_ref()).await?;
        info!(user_id = %actor.user_id, "Password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_passwords_are_refused() {
        assert!(check_password_strength("qwerty").is_err());
        assert!(check_password_strength("correct horse").is_ok());
    }

    #[test]
    fn short_passwords_fail_validation() {
        let input = CreateUserInput {
            name: "Dana".into(),
            email: "dana@example.com".into(),
            password: "12345".into(),
            role: Role::Requester,
            sector_id: Uuid::new_v4(),
        };
        assert!(input.validate().is_err());
    }
}
