use crate::{
    db::DbPool,
    entities::{
        order::{self, ActiveModel as OrderActiveModel, Entity as OrderEntity},
        order_item::{self, Entity as OrderItemEntity},
        payment::{self, ActiveModel as PaymentActiveModel, Entity as PaymentEntity, Model as PaymentModel},
        OrderStatus, PaymentType,
    },
    errors::ServiceError,
    services::orders::{find_order, items_total, load_items},
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Settlement request. Older tills send `OrderID` / `PaymentType`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    #[serde(alias = "OrderID")]
    pub order_id: i32,
    #[serde(alias = "PaymentType")]
    pub payment_type: String,
    #[serde(default, alias = "DiscountPercentage")]
    pub discount_percentage: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: i32,
    pub order_id: i32,
    pub payment_type: PaymentType,
    /// Final amount charged
    pub amount: Decimal,
    pub discount_percentage: Decimal,
    pub discount_amount: Decimal,
    pub original_amount: Decimal,
    pub payment_date: DateTime<Utc>,
    pub order_status: OrderStatus,
}

/// Amounts produced by applying a percentage discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountBreakdown {
    pub original_amount: Decimal,
    pub discount_amount: Decimal,
    pub final_amount: Decimal,
}

/// Applies `percentage` (0 to 100) to `original`, rounding the discount to
/// two decimal places. `final + discount == original` always holds.
pub fn apply_discount(original: Decimal, percentage: Decimal) -> DiscountBreakdown {
    let discount_amount = (original * percentage / dec!(100)).round_dp(2);
    DiscountBreakdown {
        original_amount: original,
        discount_amount,
        final_amount: original - discount_amount,
    }
}

pub fn parse_payment_type(raw: &str) -> Result<PaymentType, ServiceError> {
    PaymentType::from_str(raw.trim()).map_err(|_| {
        ServiceError::ValidationError(format!(
            "Invalid payment type '{}'; expected Cash, Card or Banking",
            raw
        ))
    })
}

fn validate_discount(percentage: Decimal) -> Result<(), ServiceError> {
    if percentage < Decimal::ZERO || percentage > dec!(100) {
        return Err(ServiceError::ValidationError(format!(
            "Discount percentage must be between 0 and 100, got {}",
            percentage
        )));
    }
    // Stored as DECIMAL(5,2)
    if percentage.normalize().scale() > 2 {
        return Err(ServiceError::ValidationError(format!(
            "Discount percentage allows at most two decimal places, got {}",
            percentage
        )));
    }
    Ok(())
}

/// Rebuilds the breakdown for a stored payment from the order's live lines
fn reconstruct(payment: PaymentModel, original: Decimal, status: OrderStatus) -> PaymentResponse {
    PaymentResponse {
        discount_amount: original - payment.amount,
        original_amount: original,
        id: payment.id,
        order_id: payment.order_id,
        payment_type: payment.payment_type,
        amount: payment.amount,
        discount_percentage: payment.discount_percentage,
        payment_date: payment.payment_date,
        order_status: status,
    }
}

/// Settles orders and reads back recorded payments
#[derive(Clone)]
pub struct PaymentService {
    db_pool: Arc<DbPool>,
}

impl PaymentService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Records the single payment for an order and marks it `Paid`.
    ///
    /// The payment insert and the order update commit together. The unique
    /// index on `payments.order_id` turns a concurrent double settlement into
    /// `Conflict`.
    #[instrument(skip(self))]
    pub async fn create_payment(
        &self,
        order_id: i32,
        payment_type: PaymentType,
        discount_percentage: Decimal,
    ) -> Result<PaymentResponse, ServiceError> {
        validate_discount(discount_percentage)?;

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to start transaction for payment");
            ServiceError::DatabaseError(e)
        })?;

        let order = find_order(&txn, order_id).await?;

        let existing = PaymentEntity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(&txn)
            .await?;
        if existing.is_some() || order.status == OrderStatus::Paid {
            warn!(order_id, "order already paid");
            return Err(ServiceError::Conflict(format!(
                "Order {} has already been paid",
                order_id
            )));
        }
        if order.status != OrderStatus::Ordering {
            return Err(ServiceError::InvalidState(format!(
                "Order {} is {}; only Ordering orders can be paid",
                order_id, order.status
            )));
        }

        let items = load_items(&txn, order_id).await?;
        let original = items_total(&items);
        if items.is_empty() || original <= Decimal::ZERO {
            return Err(ServiceError::EmptyOrder(format!(
                "Order {} has no items to pay for",
                order_id
            )));
        }

        let breakdown = apply_discount(original, discount_percentage);
        let now = Utc::now();

        let payment = PaymentActiveModel {
            order_id: Set(order_id),
            payment_type: Set(payment_type),
            discount_percentage: Set(discount_percentage),
            amount: Set(breakdown.final_amount),
            payment_date: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            ServiceError::from_db_conflict(e, format!("Order {} has already been paid", order_id))
        })?;

        let mut active: OrderActiveModel = order.into();
        active.status = Set(OrderStatus::Paid);
        active.total_amount = Set(Some(breakdown.final_amount));
        active.updated_at = Set(Some(now));
        active.update(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to commit payment");
            ServiceError::from_db_conflict(e, format!("Order {} has already been paid", order_id))
        })?;

        counter!("cafe_pos.payments.recorded", 1, "payment_type" => payment_type.to_string());
        info!(
            order_id,
            payment_id = payment.id,
            %payment_type,
            original = %breakdown.original_amount,
            discount = %breakdown.discount_amount,
            amount = %breakdown.final_amount,
            "Payment recorded"
        );

        Ok(PaymentResponse {
            id: payment.id,
            order_id,
            payment_type: payment.payment_type,
            amount: payment.amount,
            discount_percentage: payment.discount_percentage,
            discount_amount: breakdown.discount_amount,
            original_amount: breakdown.original_amount,
            payment_date: payment.payment_date,
            order_status: OrderStatus::Paid,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_payment(&self, payment_id: i32) -> Result<PaymentResponse, ServiceError> {
        let db = &*self.db_pool;
        let payment = PaymentEntity::find_by_id(payment_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", payment_id)))?;
        let order = find_order(db, payment.order_id).await?;
        let original = items_total(&load_items(db, order.id).await?);
        Ok(reconstruct(payment, original, order.status))
    }

    /// All payments, newest first
    #[instrument(skip(self))]
    pub async fn list_payments(&self) -> Result<Vec<PaymentResponse>, ServiceError> {
        let db = &*self.db_pool;
        let payments = PaymentEntity::find()
            .order_by_desc(payment::Column::PaymentDate)
            .order_by_desc(payment::Column::Id)
            .all(db)
            .await?;
        if payments.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<i32> = payments.iter().map(|p| p.order_id).collect();

        let statuses: HashMap<i32, OrderStatus> = OrderEntity::find()
            .filter(order::Column::Id.is_in(order_ids.clone()))
            .all(db)
            .await?
            .into_iter()
            .map(|o| (o.id, o.status))
            .collect();

        let mut originals: HashMap<i32, Decimal> = HashMap::new();
        for item in OrderItemEntity::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .all(db)
            .await?
        {
            *originals.entry(item.order_id).or_default() += item.subtotal();
        }

        Ok(payments
            .into_iter()
            .map(|p| {
                let original = originals.get(&p.order_id).copied().unwrap_or_default();
                let status = statuses
                    .get(&p.order_id)
                    .copied()
                    .unwrap_or(OrderStatus::Paid);
                reconstruct(p, original, status)
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_payments_by_order(
        &self,
        order_id: i32,
    ) -> Result<Vec<PaymentResponse>, ServiceError> {
        let db = &*self.db_pool;
        let order = find_order(db, order_id).await?;
        let original = items_total(&load_items(db, order_id).await?);

        Ok(PaymentEntity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .all(db)
            .await?
            .into_iter()
            .map(|p| reconstruct(p, original, order.status))
            .collect())
    }
}
