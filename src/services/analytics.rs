use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    entities::{
        order::{Column as OrderColumn, Entity as OrderEntity},
        order_item::{Column as OrderItemColumn, Entity as OrderItemEntity},
        payment::{Entity as PaymentEntity, Model as PaymentModel},
        product::Entity as ProductEntity,
        OrderStatus, PaymentType,
    },
    errors::ServiceError,
};

/// Optional reporting window, inclusive on both ends
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub paid_orders: u64,
    pub cancelled_orders: u64,
    pub open_orders: u64,
    /// Σ payment amounts after discount
    pub revenue: Decimal,
    pub total_discount: Decimal,
    pub average_order_value: Decimal,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub orders: u64,
    pub revenue: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: i32,
    pub product_name: String,
    pub quantity_sold: i64,
    /// Σ line subtotals, before order-level discounts
    pub revenue: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTypeStats {
    pub payment_type: PaymentType,
    pub count: u64,
    pub revenue: Decimal,
}

/// Read-only reporting over orders, lines and payments
#[derive(Clone)]
pub struct AnalyticsService {
    db: Arc<DatabaseConnection>,
}

impl AnalyticsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    // Timestamps are compared in Rust; SQLite stores them as text.
    async fn payments_in(&self, range: &DateRange) -> Result<Vec<PaymentModel>, ServiceError> {
        Ok(PaymentEntity::find()
            .all(&*self.db)
            .await?
            .into_iter()
            .filter(|p| range.contains(p.payment_date))
            .collect())
    }

    /// Σ line subtotals per order
    async fn originals(&self, order_ids: Vec<i32>) -> Result<HashMap<i32, Decimal>, ServiceError> {
        let mut totals = HashMap::new();
        if order_ids.is_empty() {
            return Ok(totals);
        }
        for item in OrderItemEntity::find()
            .filter(OrderItemColumn::OrderId.is_in(order_ids))
            .all(&*self.db)
            .await?
        {
            *totals.entry(item.order_id).or_insert(Decimal::ZERO) += item.subtotal();
        }
        Ok(totals)
    }

    #[instrument(skip(self))]
    pub async fn summary(&self, range: DateRange) -> Result<SalesSummary, ServiceError> {
        let db = &*self.db;
        let payments = self.payments_in(&range).await?;
        let originals = self
            .originals(payments.iter().map(|p| p.order_id).collect())
            .await?;

        let revenue: Decimal = payments.iter().map(|p| p.amount).sum();
        let total_discount: Decimal = payments
            .iter()
            .map(|p| originals.get(&p.order_id).copied().unwrap_or(p.amount) - p.amount)
            .sum();
        let paid_orders = payments.len() as u64;
        let average_order_value = if paid_orders == 0 {
            Decimal::ZERO
        } else {
            (revenue / Decimal::from(paid_orders)).round_dp(2)
        };

        let cancelled_orders = OrderEntity::find()
            .filter(OrderColumn::Status.eq(OrderStatus::Cancelled))
            .all(db)
            .await?
            .into_iter()
            .filter(|o| range.contains(o.order_date))
            .count() as u64;

        let open_orders = OrderEntity::find()
            .filter(OrderColumn::Status.eq(OrderStatus::Ordering))
            .count(db)
            .await?;

        info!(paid_orders, cancelled_orders, %revenue, "Sales summary generated");

        Ok(SalesSummary {
            paid_orders,
            cancelled_orders,
            open_orders,
            revenue,
            total_discount,
            average_order_value,
            generated_at: Utc::now(),
        })
    }

    /// Revenue per UTC day for the last `days` days, today included.
    /// Days without payments are reported with zero.
    #[instrument(skip(self))]
    pub async fn revenue_by_day(&self, days: u32) -> Result<Vec<DailyRevenue>, ServiceError> {
        if !(1..=365).contains(&days) {
            return Err(ServiceError::ValidationError(format!(
                "days must be between 1 and 365, got {}",
                days
            )));
        }

        let today = Utc::now().date_naive();
        let first_day = today - Duration::days(i64::from(days) - 1);
        let start = first_day
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| ServiceError::InternalError("invalid start of day".to_string()))?
            .and_utc();

        let payments = self
            .payments_in(&DateRange {
                from: Some(start),
                to: None,
            })
            .await?;

        let mut buckets: BTreeMap<NaiveDate, (u64, Decimal)> = first_day
            .iter_days()
            .take(days as usize)
            .map(|d| (d, (0, Decimal::ZERO)))
            .collect();

        for p in payments {
            if let Some(bucket) = buckets.get_mut(&p.payment_date.date_naive()) {
                bucket.0 += 1;
                bucket.1 += p.amount;
            }
        }

        Ok(buckets
            .into_iter()
            .map(|(date, (orders, revenue))| DailyRevenue {
                date,
                orders,
                revenue,
            })
            .collect())
    }

    /// Best sellers over paid orders, by quantity
    #[instrument(skip(self))]
    pub async fn top_products(&self, limit: usize) -> Result<Vec<TopProduct>, ServiceError> {
        if !(1..=100).contains(&limit) {
            return Err(ServiceError::ValidationError(format!(
                "limit must be between 1 and 100, got {}",
                limit
            )));
        }
        let db = &*self.db;

        let paid_ids: Vec<i32> = OrderEntity::find()
            .filter(OrderColumn::Status.eq(OrderStatus::Paid))
            .all(db)
            .await?
            .into_iter()
            .map(|o| o.id)
            .collect();
        if paid_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut per_product: HashMap<i32, (i64, Decimal)> = HashMap::new();
        for item in OrderItemEntity::find()
            .filter(OrderItemColumn::OrderId.is_in(paid_ids))
            .all(db)
            .await?
        {
            let entry = per_product.entry(item.product_id).or_insert((0, Decimal::ZERO));
            entry.0 += i64::from(item.quantity);
            entry.1 += item.subtotal();
        }

        let names: HashMap<i32, String> = ProductEntity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        let mut ranked: Vec<TopProduct> = per_product
            .into_iter()
            .map(|(product_id, (quantity_sold, revenue))| TopProduct {
                product_name: names.get(&product_id).cloned().unwrap_or_default(),
                product_id,
                quantity_sold,
                revenue,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.quantity_sold
                .cmp(&a.quantity_sold)
                .then_with(|| b.revenue.cmp(&a.revenue))
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }

    #[instrument(skip(self))]
    pub async fn payment_type_breakdown(
        &self,
        range: DateRange,
    ) -> Result<Vec<PaymentTypeStats>, ServiceError> {
        let payments = self.payments_in(&range).await?;
        Ok([PaymentType::Cash, PaymentType::Card, PaymentType::Banking]
            .into_iter()
            .map(|payment_type| {
                let matching = payments.iter().filter(|p| p.payment_type == payment_type);
                PaymentTypeStats {
                    payment_type,
                    count: matching.clone().count() as u64,
                    revenue: matching.map(|p| p.amount).sum(),
                }
            })
            .collect())
    }
}
