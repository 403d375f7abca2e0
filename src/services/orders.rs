use crate::{
    db::DbPool,
    entities::{
        dining_table::Entity as DiningTableEntity,
        order::{self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel},
        order_item::{
            self, ActiveModel as OrderItemActiveModel, Entity as OrderItemEntity,
            Model as OrderItemModel,
        },
        payment::{self, Entity as PaymentEntity},
        product::{self, Entity as ProductEntity},
        user::Entity as UserEntity,
        OrderStatus,
    },
    errors::ServiceError,
    services::order_status::{self, Transition},
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(range(min = 1, message = "tableId must be a positive id"))]
    pub table_id: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddOrderItemRequest {
    #[validate(range(min = 1, message = "productId must be a positive id"))]
    pub product_id: i32,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(length(max = 500, message = "Notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderItemRequest {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(length(max = 500, message = "Notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

/// Optional filters for listing orders
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub table_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: i32,
    pub table_id: i32,
    pub table_name: String,
    pub user_id: i32,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    /// Live sum while `Ordering`, the frozen stored total afterwards
    pub total_amount: Decimal,
    /// Payment time for paid orders, creation time otherwise
    pub display_date: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOrderItemResponse {
    #[serde(flatten)]
    pub item: OrderItemResponse,
    /// True when the quantity was merged into an existing line
    pub merged: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub item_count: usize,
    pub total_quantity: i64,
    /// Σ quantity × unit price over the current lines
    pub items_total: Decimal,
    pub total_amount: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetailResponse {
    pub order: OrderResponse,
    pub items: Vec<OrderItemResponse>,
    pub summary: OrderSummary,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveItemResponse {
    pub order_cancelled: bool,
    pub remaining_items: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateResponse {
    pub order: OrderResponse,
    pub already_in_status: bool,
}

/// Σ quantity × unit price
pub fn items_total(items: &[OrderItemModel]) -> Decimal {
    items.iter().map(OrderItemModel::subtotal).sum()
}

fn display_total(order: &OrderModel, live_total: Decimal) -> Decimal {
    if order.status == OrderStatus::Ordering {
        live_total
    } else {
        order.total_amount.unwrap_or(live_total)
    }
}

fn display_date(order: &OrderModel, payment_date: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match (order.status, payment_date) {
        (OrderStatus::Paid, Some(paid_at)) => paid_at,
        _ => order.order_date,
    }
}

fn validate_quantity(quantity: i32) -> Result<(), ServiceError> {
    if quantity < 1 {
        return Err(ServiceError::ValidationError(format!(
            "Quantity must be at least 1, got {}",
            quantity
        )));
    }
    Ok(())
}

fn ensure_mutable(order: &OrderModel) -> Result<(), ServiceError> {
    if !order_status::is_mutable(order.status) {
        warn!(order_id = order.id, status = %order.status, "order is not open for changes");
        return Err(ServiceError::InvalidState(format!(
            "Order {} is {}; items can only be changed while the order is Ordering",
            order.id, order.status
        )));
    }
    Ok(())
}

pub(crate) async fn find_order<C: ConnectionTrait>(
    conn: &C,
    order_id: i32,
) -> Result<OrderModel, ServiceError> {
    OrderEntity::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}

pub(crate) async fn load_items<C: ConnectionTrait>(
    conn: &C,
    order_id: i32,
) -> Result<Vec<OrderItemModel>, ServiceError> {
    Ok(OrderItemEntity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Id)
        .all(conn)
        .await?)
}

async fn find_item<C: ConnectionTrait>(
    conn: &C,
    order_id: i32,
    item_id: i32,
) -> Result<OrderItemModel, ServiceError> {
    OrderItemEntity::find_by_id(item_id)
        .filter(order_item::Column::OrderId.eq(order_id))
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Item {} not found in order {}", item_id, order_id))
        })
}

async fn product_names<C: ConnectionTrait>(
    conn: &C,
    items: &[OrderItemModel],
) -> Result<HashMap<i32, String>, ServiceError> {
    let ids: Vec<i32> = items.iter().map(|i| i.product_id).collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(ProductEntity::find()
        .filter(product::Column::Id.is_in(ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect())
}

fn item_to_response(item: OrderItemModel, names: &HashMap<i32, String>) -> OrderItemResponse {
    OrderItemResponse {
        subtotal: item.subtotal(),
        product_name: names.get(&item.product_id).cloned().unwrap_or_default(),
        id: item.id,
        order_id: item.order_id,
        product_id: item.product_id,
        quantity: item.quantity,
        unit_price: item.unit_price,
        notes: item.notes,
        created_at: item.created_at,
    }
}

fn model_to_response(
    order: OrderModel,
    table_name: String,
    live_total: Decimal,
    payment_date: Option<DateTime<Utc>>,
) -> OrderResponse {
    OrderResponse {
        total_amount: display_total(&order, live_total),
        display_date: display_date(&order, payment_date),
        id: order.id,
        table_id: order.table_id,
        table_name,
        user_id: order.user_id,
        order_date: order.order_date,
        status: order.status,
        updated_at: order.updated_at,
    }
}

/// Builds the canonical order DTO, loading table, lines and payment.
pub(crate) async fn build_order_response<C: ConnectionTrait>(
    conn: &C,
    order: OrderModel,
) -> Result<OrderResponse, ServiceError> {
    let items = load_items(conn, order.id).await?;
    let table_name = DiningTableEntity::find_by_id(order.table_id)
        .one(conn)
        .await?
        .map(|t| t.name)
        .unwrap_or_default();
    let payment_date = PaymentEntity::find()
        .filter(payment::Column::OrderId.eq(order.id))
        .one(conn)
        .await?
        .map(|p| p.payment_date);
    Ok(model_to_response(
        order,
        table_name,
        items_total(&items),
        payment_date,
    ))
}

async fn touch<C: ConnectionTrait>(conn: &C, order: OrderModel) -> Result<(), ServiceError> {
    let mut active: OrderActiveModel = order.into();
    active.updated_at = Set(Some(Utc::now()));
    active.update(conn).await?;
    Ok(())
}

/// Order taking: opening tabs, mutating lines and moving orders through
/// their status machine.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Opens a new `Ordering` tab for a table.
    ///
    /// The free-table check and the insert share a transaction, and the
    /// partial unique index on `orders(table_id) WHERE status = 'Ordering'`
    /// turns a lost race into `Conflict`.
    #[instrument(skip(self))]
    pub async fn create_order(
        &self,
        table_id: i32,
        user_id: i32,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let table = DiningTableEntity::find_by_id(table_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Table {} not found", table_id)))?;

        if UserEntity::find_by_id(user_id).one(&txn).await?.is_none() {
            return Err(ServiceError::NotFound(format!("User {} not found", user_id)));
        }

        if let Some(active) = active_order_for_table(&txn, table_id).await? {
            warn!(table_id, order_id = active.id, "table already has an active order");
            return Err(ServiceError::Conflict(format!(
                "Table {} already has an active order ({})",
                table.name, active.id
            )));
        }

        let now = Utc::now();
        let order = OrderActiveModel {
            table_id: Set(table_id),
            user_id: Set(user_id),
            order_date: Set(now),
            status: Set(OrderStatus::Ordering),
            total_amount: Set(None),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            ServiceError::from_db_conflict(
                e,
                format!("Table {} already has an active order", table.name),
            )
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = order.id, "Failed to commit order creation");
            ServiceError::from_db_conflict(
                e,
                format!("Table {} already has an active order", table.name),
            )
        })?;

        counter!("cafe_pos.orders.created", 1);
        info!(order_id = order.id, table_id, user_id, "Order created");

        Ok(model_to_response(order, table.name, Decimal::ZERO, None))
    }

    /// Adds a product line, merging into an existing line for the same product.
    ///
    /// On merge only the quantity grows; the existing line keeps its captured
    /// unit price and its original notes.
    #[instrument(skip(self, notes))]
    pub async fn add_order_item(
        &self,
        order_id: i32,
        product_id: i32,
        quantity: i32,
        notes: Option<String>,
    ) -> Result<AddOrderItemResponse, ServiceError> {
        validate_quantity(quantity)?;
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let order = find_order(&txn, order_id).await?;
        ensure_mutable(&order)?;

        let product = ProductEntity::find_by_id(product_id)
            .filter(product::Column::Available.eq(true))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Product {} not found or unavailable",
                    product_id
                ))
            })?;

        let existing = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .filter(order_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;

        let (item, merged) = match existing {
            Some(line) => {
                let new_quantity = line.quantity.checked_add(quantity).ok_or_else(|| {
                    ServiceError::ValidationError("Quantity is too large".to_string())
                })?;
                let mut active: OrderItemActiveModel = line.into();
                active.quantity = Set(new_quantity);
                (active.update(&txn).await?, true)
            }
            None => {
                let line = OrderItemActiveModel {
                    order_id: Set(order_id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    unit_price: Set(product.price),
                    notes: Set(notes),
                    created_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
                (line, false)
            }
        };

        touch(&txn, order).await?;
        txn.commit().await?;

        info!(order_id, product_id, item_id = item.id, merged, "Order item added");

        let names = HashMap::from([(product.id, product.name)]);
        Ok(AddOrderItemResponse {
            item: item_to_response(item, &names),
            merged,
        })
    }

    /// Replaces a line's quantity and notes.
    #[instrument(skip(self, notes))]
    pub async fn update_order_item(
        &self,
        order_id: i32,
        item_id: i32,
        quantity: i32,
        notes: Option<String>,
    ) -> Result<OrderItemResponse, ServiceError> {
        validate_quantity(quantity)?;
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let order = find_order(&txn, order_id).await?;
        ensure_mutable(&order)?;
        let item = find_item(&txn, order_id, item_id).await?;

        let mut active: OrderItemActiveModel = item.into();
        active.quantity = Set(quantity);
        active.notes = Set(notes);
        let item = active.update(&txn).await?;

        touch(&txn, order).await?;
        let names = product_names(&txn, std::slice::from_ref(&item)).await?;
        txn.commit().await?;

        info!(order_id, item_id, quantity, "Order item updated");
        Ok(item_to_response(item, &names))
    }

    /// Deletes a line. Removing the last line cancels the order in the same
    /// transaction with its total frozen at zero.
    #[instrument(skip(self))]
    pub async fn remove_order_item(
        &self,
        order_id: i32,
        item_id: i32,
    ) -> Result<RemoveItemResponse, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let order = find_order(&txn, order_id).await?;
        ensure_mutable(&order)?;
        let item = find_item(&txn, order_id, item_id).await?;

        OrderItemEntity::delete_by_id(item.id).exec(&txn).await?;

        let remaining_items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .count(&txn)
            .await?;

        let order_cancelled = remaining_items == 0;
        let mut active: OrderActiveModel = order.into();
        if order_cancelled {
            active.status = Set(OrderStatus::Cancelled);
            active.total_amount = Set(Some(Decimal::ZERO));
        }
        active.updated_at = Set(Some(Utc::now()));
        active.update(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to commit item removal");
            ServiceError::DatabaseError(e)
        })?;

        if order_cancelled {
            counter!("cafe_pos.orders.auto_cancelled", 1);
            info!(order_id, "Last item removed; order cancelled");
        } else {
            info!(order_id, item_id, remaining_items, "Order item removed");
        }

        Ok(RemoveItemResponse {
            order_cancelled,
            remaining_items,
        })
    }

    /// Generic status change.
    ///
    /// Same status is a no-op. Nothing leaves `Paid` or `Cancelled`. Moving to
    /// `Paid` here needs an existing payment. Leaving `Ordering` freezes the
    /// live item total.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: i32,
        new_status: OrderStatus,
    ) -> Result<StatusUpdateResponse, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let order = find_order(&txn, order_id).await?;
        let old_status = order.status;

        match order_status::transition(old_status, new_status) {
            Transition::Unchanged => {
                let order = build_order_response(&txn, order).await?;
                return Ok(StatusUpdateResponse {
                    order,
                    already_in_status: true,
                });
            }
            Transition::Rejected => {
                warn!(order_id, %old_status, %new_status, "rejected status transition");
                return Err(ServiceError::InvalidState(format!(
                    "Order {} is {} and cannot change to {}",
                    order_id, old_status, new_status
                )));
            }
            Transition::Allowed => {}
        }

        if new_status == OrderStatus::Paid {
            let has_payment = PaymentEntity::find()
                .filter(payment::Column::OrderId.eq(order_id))
                .one(&txn)
                .await?
                .is_some();
            if !has_payment {
                return Err(ServiceError::MissingPayment(format!(
                    "Order {} has no payment; record a payment to mark it Paid",
                    order_id
                )));
            }
        }

        let live_total = items_total(&load_items(&txn, order_id).await?);
        let mut active: OrderActiveModel = order.into();
        active.status = Set(new_status);
        active.total_amount = Set(Some(live_total));
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        let order = build_order_response(&txn, updated).await?;
        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to commit status update");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id, %old_status, %new_status, "Order status updated");
        Ok(StatusUpdateResponse {
            order,
            already_in_status: false,
        })
    }

    /// Order with its lines and a totals summary
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: i32) -> Result<OrderDetailResponse, ServiceError> {
        let db = &*self.db_pool;
        let order = find_order(db, order_id).await?;
        let items = load_items(db, order_id).await?;
        let names = product_names(db, &items).await?;

        let items_total = items_total(&items);
        let total_quantity = items.iter().map(|i| i64::from(i.quantity)).sum();
        let order = build_order_response(db, order).await?;

        let items: Vec<OrderItemResponse> = items
            .into_iter()
            .map(|item| item_to_response(item, &names))
            .collect();

        Ok(OrderDetailResponse {
            summary: OrderSummary {
                item_count: items.len(),
                total_quantity,
                items_total,
                total_amount: order.total_amount,
            },
            order,
            items,
        })
    }

    /// Order history sorted by display date, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<OrderResponse>, ServiceError> {
        let db = &*self.db_pool;

        let mut query = OrderEntity::find();
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(table_id) = filter.table_id {
            query = query.filter(order::Column::TableId.eq(table_id));
        }
        let orders = query.all(db).await?;
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = orders.iter().map(|o| o.id).collect();

        let mut live_totals: HashMap<i32, Decimal> = HashMap::new();
        for item in OrderItemEntity::find()
            .filter(order_item::Column::OrderId.is_in(ids.clone()))
            .all(db)
            .await?
        {
            *live_totals.entry(item.order_id).or_default() += item.subtotal();
        }

        let payment_dates: HashMap<i32, DateTime<Utc>> = PaymentEntity::find()
            .filter(payment::Column::OrderId.is_in(ids))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.order_id, p.payment_date))
            .collect();

        let table_names: HashMap<i32, String> = DiningTableEntity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect();

        let mut responses: Vec<OrderResponse> = orders
            .into_iter()
            .map(|o| {
                let live = live_totals.get(&o.id).copied().unwrap_or_default();
                let paid_at = payment_dates.get(&o.id).copied();
                let name = table_names.get(&o.table_id).cloned().unwrap_or_default();
                model_to_response(o, name, live, paid_at)
            })
            .collect();

        responses.sort_by(|a, b| {
            b.display_date
                .cmp(&a.display_date)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(responses)
    }

    #[instrument(skip(self))]
    pub async fn list_items(&self, order_id: i32) -> Result<Vec<OrderItemResponse>, ServiceError> {
        let db = &*self.db_pool;
        find_order(db, order_id).await?;
        let items = load_items(db, order_id).await?;
        let names = product_names(db, &items).await?;
        Ok(items
            .into_iter()
            .map(|item| item_to_response(item, &names))
            .collect())
    }
}

/// The table's open tab, if any. Always read from the database.
pub async fn active_order_for_table<C: ConnectionTrait>(
    conn: &C,
    table_id: i32,
) -> Result<Option<OrderModel>, ServiceError> {
    Ok(OrderEntity::find()
        .filter(order::Column::TableId.eq(table_id))
        .filter(order::Column::Status.eq(OrderStatus::Ordering))
        .one(conn)
        .await?)
}

/// Map of table id to its open order id
pub(crate) async fn active_orders_by_table<C: ConnectionTrait>(
    conn: &C,
) -> Result<HashMap<i32, i32>, ServiceError> {
    Ok(OrderEntity::find()
        .filter(order::Column::Status.eq(OrderStatus::Ordering))
        .all(conn)
        .await?
        .into_iter()
        .map(|o| (o.table_id, o.id))
        .collect())
}
