use crate::{
    db::DbPool,
    entities::{
        dining_table::{self, ActiveModel as TableActiveModel, Entity as TableEntity, Model as TableModel},
        order::{self, Entity as OrderEntity},
    },
    errors::ServiceError,
    services::orders::{active_order_for_table, active_orders_by_table},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableRequest {
    #[validate(length(min = 1, max = 64, message = "Name must be 1-64 characters"))]
    pub name: String,
    #[validate(range(min = 1, max = 100, message = "Capacity must be between 1 and 100"))]
    pub capacity: i32,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTableRequest {
    #[validate(length(min = 1, max = 64, message = "Name must be 1-64 characters"))]
    pub name: Option<String>,
    #[validate(range(min = 1, max = 100, message = "Capacity must be between 1 and 100"))]
    pub capacity: Option<i32>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableResponse {
    pub id: i32,
    pub name: String,
    pub capacity: i32,
    pub description: Option<String>,
    /// Open order on this table, derived on every read
    pub current_order_id: Option<i32>,
    pub occupied: bool,
    pub created_at: DateTime<Utc>,
}

fn to_response(table: TableModel, current_order_id: Option<i32>) -> TableResponse {
    TableResponse {
        id: table.id,
        name: table.name,
        capacity: table.capacity,
        description: table.description,
        occupied: current_order_id.is_some(),
        current_order_id,
        created_at: table.created_at,
    }
}

#[derive(Clone)]
pub struct TableService {
    db_pool: Arc<DbPool>,
}

impl TableService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    async fn find(&self, id: i32) -> Result<TableModel, ServiceError> {
        TableEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Table {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn list_tables(&self) -> Result<Vec<TableResponse>, ServiceError> {
        let db = &*self.db_pool;
        let active = active_orders_by_table(db).await?;
        Ok(TableEntity::find()
            .order_by_asc(dining_table::Column::Name)
            .all(db)
            .await?
            .into_iter()
            .map(|t| {
                let current = active.get(&t.id).copied();
                to_response(t, current)
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_table(&self, id: i32) -> Result<TableResponse, ServiceError> {
        let table = self.find(id).await?;
        let current = active_order_for_table(&*self.db_pool, id).await?.map(|o| o.id);
        Ok(to_response(table, current))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_table(
        &self,
        request: CreateTableRequest,
    ) -> Result<TableResponse, ServiceError> {
        request.validate()?;
        let name = request.name.trim().to_string();

        let table = TableActiveModel {
            name: Set(name.clone()),
            capacity: Set(request.capacity),
            description: Set(request.description),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| ServiceError::from_db_conflict(e, format!("Table '{}' already exists", name)))?;

        info!(table_id = table.id, "Table created");
        Ok(to_response(table, None))
    }

    #[instrument(skip(self, request))]
    pub async fn update_table(
        &self,
        id: i32,
        request: UpdateTableRequest,
    ) -> Result<TableResponse, ServiceError> {
        request.validate()?;
        let table = self.find(id).await?;

        let mut active: TableActiveModel = table.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(capacity) = request.capacity {
            active.capacity = Set(capacity);
        }
        if request.description.is_some() {
            active.description = Set(request.description);
        }

        let table = active
            .update(&*self.db_pool)
            .await
            .map_err(|e| ServiceError::from_db_conflict(e, "A table with that name already exists"))?;

        self.get_table(table.id).await
    }

    /// Hard delete. Tables that any order references are kept.
    #[instrument(skip(self))]
    pub async fn delete_table(&self, id: i32) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let table = self.find(id).await?;

        let referencing = OrderEntity::find()
            .filter(order::Column::TableId.eq(id))
            .count(db)
            .await?;
        if referencing > 0 {
            return Err(ServiceError::Conflict(format!(
                "Table '{}' is referenced by {} order(s) and cannot be deleted",
                table.name, referencing
            )));
        }

        TableEntity::delete_by_id(id).exec(db).await?;
        info!(table_id = id, "Table deleted");
        Ok(())
    }
}
