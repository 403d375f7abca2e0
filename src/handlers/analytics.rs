use crate::{
    errors::ServiceError,
    handlers::{extract::ApiQuery, AppState},
    services::analytics::{DailyRevenue, DateRange, PaymentTypeStats, SalesSummary, TopProduct},
    ApiResponse,
};
use axum::{extract::State, Json};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    7
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

/// Sales summary, optionally bounded by `?from=&to=` (RFC 3339)
pub async fn sales_summary(
    State(state): State<AppState>,
    ApiQuery(range): ApiQuery<DateRange>,
) -> Result<Json<ApiResponse<SalesSummary>>, ServiceError> {
    let summary = state.services.analytics.summary(range).await?;
    Ok(Json(ApiResponse::success(summary)))
}

pub async fn revenue_by_day(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DaysQuery>,
) -> Result<Json<ApiResponse<Vec<DailyRevenue>>>, ServiceError> {
    let days = state.services.analytics.revenue_by_day(query.days).await?;
    Ok(Json(ApiResponse::success(days)))
}

pub async fn top_products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<TopProduct>>>, ServiceError> {
    let products = state.services.analytics.top_products(query.limit).await?;
    Ok(Json(ApiResponse::success(products)))
}

pub async fn payment_types(
    State(state): State<AppState>,
    ApiQuery(range): ApiQuery<DateRange>,
) -> Result<Json<ApiResponse<Vec<PaymentTypeStats>>>, ServiceError> {
    let breakdown = state
        .services
        .analytics
        .payment_type_breakdown(range)
        .await?;
    Ok(Json(ApiResponse::success(breakdown)))
}
