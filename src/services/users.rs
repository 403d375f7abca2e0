use crate::{
    auth::AuthService,
    db::DbPool,
    entities::{
        order::{self, Entity as OrderEntity},
        user::{self, ActiveModel as UserActiveModel, Entity as UserEntity, Model as UserModel},
        Role,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 64, message = "Username must be 3-64 characters"))]
    pub username: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 200, message = "Full name is required"))]
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 200, message = "Full name is required"))]
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<UserModel> for UserResponse {
    fn from(u: UserModel) -> Self {
        Self {
            id: u.id,
            username: u.username,
            full_name: u.full_name,
            role: u.role,
            active: u.active,
            created_at: u.created_at,
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    async fn find(&self, id: i32) -> Result<UserModel, ServiceError> {
        UserEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<UserResponse>, ServiceError> {
        Ok(UserEntity::find()
            .order_by_asc(user::Column::Username)
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(UserResponse::from)
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: i32) -> Result<UserResponse, ServiceError> {
        self.find(id).await.map(UserResponse::from)
    }

    pub async fn count_users(&self) -> Result<u64, ServiceError> {
        Ok(UserEntity::find().count(&*self.db_pool).await?)
    }

    #[instrument(skip(self, request), fields(username = %request.username, role = %request.role))]
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<UserResponse, ServiceError> {
        request.validate()?;
        let username = request.username.trim().to_lowercase();
        let password_hash = AuthService::hash_password(&request.password)?;

        let user = UserActiveModel {
            username: Set(username.clone()),
            password_hash: Set(password_hash),
            full_name: Set(request.full_name.trim().to_string()),
            role: Set(request.role),
            active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| ServiceError::from_db_conflict(e, format!("Username '{}' is taken", username)))?;

        info!(user_id = user.id, "User created");
        Ok(user.into())
    }

    #[instrument(skip(self, request))]
    pub async fn update_user(
        &self,
        id: i32,
        request: UpdateUserRequest,
    ) -> Result<UserResponse, ServiceError> {
        request.validate()?;
        let user = self.find(id).await?;

        let mut active: UserActiveModel = user.into();
        if let Some(full_name) = request.full_name {
            active.full_name = Set(full_name.trim().to_string());
        }
        if let Some(role) = request.role {
            active.role = Set(role);
        }
        if let Some(is_active) = request.active {
            active.active = Set(is_active);
        }
        if let Some(password) = request.password {
            active.password_hash = Set(AuthService::hash_password(&password)?);
        }

        let user = active.update(&*self.db_pool).await?;
        info!(user_id = id, "User updated");
        Ok(user.into())
    }

    /// Deletes a user account. Accounts that opened orders are deactivated
    /// instead so order history keeps its author.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: i32, acting_user_id: i32) -> Result<(), ServiceError> {
        if id == acting_user_id {
            return Err(ServiceError::ValidationError(
                "You cannot delete your own account".to_string(),
            ));
        }
        let user = self.find(id).await?;
        let db = &*self.db_pool;

        let orders = OrderEntity::find()
            .filter(order::Column::UserId.eq(id))
            .count(db)
            .await?;
        if orders > 0 {
            let mut active: UserActiveModel = user.into();
            active.active = Set(false);
            active.update(db).await?;
            info!(user_id = id, orders, "User deactivated");
        } else {
            UserEntity::delete_by_id(id).exec(db).await?;
            info!(user_id = id, "User deleted");
        }
        Ok(())
    }

    /// Checks credentials for login. Unknown users, wrong passwords and
    /// inactive accounts all fail the same way.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<UserModel, ServiceError> {
        let username = username.trim().to_lowercase();
        let user = UserEntity::find()
            .filter(user::Column::Username.eq(username.as_str()))
            .one(&*self.db_pool)
            .await?;

        match user {
            Some(user) if user.active && AuthService::verify_password(password, &user.password_hash) => {
                info!(user_id = user.id, "User authenticated");
                Ok(user)
            }
            _ => {
                warn!(%username, "login failed");
                Err(ServiceError::Unauthorized(
                    "Invalid username or password".to_string(),
                ))
            }
        }
    }
}
