use crate::{
    db::DbPool,
    entities::{
        category::{self, ActiveModel as CategoryActiveModel, Entity as CategoryEntity, Model as CategoryModel},
        product::{self, ActiveModel as ProductActiveModel, Entity as ProductEntity, Model as ProductModel},
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::{Validate, ValidationError};

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price <= Decimal::ZERO {
        let mut err = ValidationError::new("price");
        err.message = Some("Price must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    pub category_id: i32,
    #[validate(length(max = 1000))]
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,
    #[validate(custom = "validate_price")]
    pub price: Option<Decimal>,
    pub category_id: Option<i32>,
    #[validate(length(max = 1000))]
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    pub category_id: Option<i32>,
    #[serde(default)]
    pub include_unavailable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub available: bool,
    pub product_count: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: i32,
    pub name: String,
    pub price: Decimal,
    pub category_id: i32,
    pub category_name: String,
    pub image_url: Option<String>,
    pub available: bool,
    pub created_at: DateTime<Utc>,
}

fn category_to_response(c: CategoryModel, product_count: u64) -> CategoryResponse {
    CategoryResponse {
        id: c.id,
        name: c.name,
        description: c.description,
        available: c.available,
        product_count,
        created_at: c.created_at,
    }
}

fn product_to_response(p: ProductModel, category_name: String) -> ProductResponse {
    ProductResponse {
        id: p.id,
        name: p.name,
        price: p.price,
        category_id: p.category_id,
        category_name,
        image_url: p.image_url,
        available: p.available,
        created_at: p.created_at,
    }
}

/// Categories and products. Both are soft-deleted through their
/// `available` flag and can be restored.
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    async fn find_category(&self, id: i32) -> Result<CategoryModel, ServiceError> {
        CategoryEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))
    }

    async fn find_product(&self, id: i32) -> Result<ProductModel, ServiceError> {
        ProductEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    /// The category must exist and be available to hold products.
    async fn require_available_category(&self, id: i32) -> Result<CategoryModel, ServiceError> {
        let category = CategoryEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::ValidationError(format!("Category {} does not exist", id)))?;
        if !category.available {
            return Err(ServiceError::ValidationError(format!(
                "Category '{}' is unavailable",
                category.name
            )));
        }
        Ok(category)
    }

    async fn available_products_in(&self, category_id: i32) -> Result<u64, ServiceError> {
        Ok(ProductEntity::find()
            .filter(product::Column::CategoryId.eq(category_id))
            .filter(product::Column::Available.eq(true))
            .count(&*self.db_pool)
            .await?)
    }

    // Categories

    #[instrument(skip(self))]
    pub async fn list_categories(
        &self,
        include_unavailable: bool,
    ) -> Result<Vec<CategoryResponse>, ServiceError> {
        let db = &*self.db_pool;
        let mut query = CategoryEntity::find().order_by_asc(category::Column::Name);
        if !include_unavailable {
            query = query.filter(category::Column::Available.eq(true));
        }
        let categories = query.all(db).await?;

        let mut counts: HashMap<i32, u64> = HashMap::new();
        for p in ProductEntity::find()
            .filter(product::Column::Available.eq(true))
            .all(db)
            .await?
        {
            *counts.entry(p.category_id).or_default() += 1;
        }

        Ok(categories
            .into_iter()
            .map(|c| {
                let count = counts.get(&c.id).copied().unwrap_or(0);
                category_to_response(c, count)
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_category(&self, id: i32) -> Result<CategoryResponse, ServiceError> {
        let category = self.find_category(id).await?;
        let count = self.available_products_in(id).await?;
        Ok(category_to_response(category, count))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_category(
        &self,
        request: CreateCategoryRequest,
    ) -> Result<CategoryResponse, ServiceError> {
        request.validate()?;
        let name = request.name.trim().to_string();

        let category = CategoryActiveModel {
            name: Set(name.clone()),
            description: Set(request.description),
            available: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| ServiceError::from_db_conflict(e, format!("Category '{}' already exists", name)))?;

        info!(category_id = category.id, "Category created");
        Ok(category_to_response(category, 0))
    }

    #[instrument(skip(self, request))]
    pub async fn update_category(
        &self,
        id: i32,
        request: UpdateCategoryRequest,
    ) -> Result<CategoryResponse, ServiceError> {
        request.validate()?;
        let category = self.find_category(id).await?;

        let mut active: CategoryActiveModel = category.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if request.description.is_some() {
            active.description = Set(request.description);
        }
        active
            .update(&*self.db_pool)
            .await
            .map_err(|e| ServiceError::from_db_conflict(e, "A category with that name already exists"))?;

        self.get_category(id).await
    }

    /// Soft delete. Refused while the category still has available products.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: i32) -> Result<(), ServiceError> {
        let category = self.find_category(id).await?;
        let active_products = self.available_products_in(id).await?;
        if active_products > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category '{}' still has {} available product(s)",
                category.name, active_products
            )));
        }

        let mut active: CategoryActiveModel = category.into();
        active.available = Set(false);
        active.update(&*self.db_pool).await?;
        info!(category_id = id, "Category deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn restore_category(&self, id: i32) -> Result<CategoryResponse, ServiceError> {
        let category = self.find_category(id).await?;
        let mut active: CategoryActiveModel = category.into();
        active.available = Set(true);
        active.update(&*self.db_pool).await?;
        info!(category_id = id, "Category restored");
        self.get_category(id).await
    }

    // Products

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
    ) -> Result<Vec<ProductResponse>, ServiceError> {
        let db = &*self.db_pool;
        let mut query = ProductEntity::find().order_by_asc(product::Column::Name);
        if let Some(category_id) = filter.category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }
        if !filter.include_unavailable {
            query = query.filter(product::Column::Available.eq(true));
        }
        let products = query.all(db).await?;

        let names: HashMap<i32, String> = CategoryEntity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        Ok(products
            .into_iter()
            .map(|p| {
                let name = names.get(&p.category_id).cloned().unwrap_or_default();
                product_to_response(p, name)
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: i32) -> Result<ProductResponse, ServiceError> {
        let product = self.find_product(id).await?;
        let category = self.find_category(product.category_id).await?;
        Ok(product_to_response(product, category.name))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;
        let category = self.require_available_category(request.category_id).await?;

        let product = ProductActiveModel {
            name: Set(request.name.trim().to_string()),
            price: Set(request.price.round_dp(2)),
            category_id: Set(category.id),
            image_url: Set(request.image_url),
            available: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(product_id = product.id, category_id = category.id, "Product created");
        Ok(product_to_response(product, category.name))
    }

    /// Price changes only affect lines added afterwards.
    #[instrument(skip(self, request))]
    pub async fn update_product(
        &self,
        id: i32,
        request: UpdateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;
        let product = self.find_product(id).await?;

        let mut active: ProductActiveModel = product.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(price) = request.price {
            active.price = Set(price.round_dp(2));
        }
        if let Some(category_id) = request.category_id {
            let category = self.require_available_category(category_id).await?;
            active.category_id = Set(category.id);
        }
        if request.image_url.is_some() {
            active.image_url = Set(request.image_url);
        }
        active.update(&*self.db_pool).await?;

        self.get_product(id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: i32) -> Result<(), ServiceError> {
        let product = self.find_product(id).await?;
        let mut active: ProductActiveModel = product.into();
        active.available = Set(false);
        active.update(&*self.db_pool).await?;
        info!(product_id = id, "Product deleted");
        Ok(())
    }

    /// Makes a product sellable again; its category must be available.
    #[instrument(skip(self))]
    pub async fn restore_product(&self, id: i32) -> Result<ProductResponse, ServiceError> {
        let product = self.find_product(id).await?;
        self.require_available_category(product.category_id).await?;

        let mut active: ProductActiveModel = product.into();
        active.available = Set(true);
        active.update(&*self.db_pool).await?;
        info!(product_id = id, "Product restored");
        self.get_product(id).await
    }
}
