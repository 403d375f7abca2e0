use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::{
        extract::{ApiJson, ApiPath},
        AppState,
    },
    services::payments::{parse_payment_type, CreatePaymentRequest, PaymentResponse},
    ApiResponse,
};
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use tracing::info;

/// Settle an order
pub async fn create_payment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiJson(request): ApiJson<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentResponse>>), ServiceError> {
    let payment_type = parse_payment_type(&request.payment_type)?;
    let discount = request.discount_percentage.unwrap_or(Decimal::ZERO);

    let payment = state
        .services
        .payments
        .create_payment(request.order_id, payment_type, discount)
        .await?;

    info!(
        payment_id = payment.id,
        order_id = payment.order_id,
        cashier = %auth_user.username,
        "Payment accepted"
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(payment, "Payment recorded")),
    ))
}

pub async fn list_payments(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<PaymentResponse>>>, ServiceError> {
    let payments = state.services.payments.list_payments().await?;
    Ok(Json(ApiResponse::success(payments)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    ApiPath(payment_id): ApiPath<i32>,
) -> Result<Json<ApiResponse<PaymentResponse>>, ServiceError> {
    let payment = state.services.payments.get_payment(payment_id).await?;
    Ok(Json(ApiResponse::success(payment)))
}

pub async fn get_payments_by_order(
    State(state): State<AppState>,
    ApiPath(order_id): ApiPath<i32>,
) -> Result<Json<ApiResponse<Vec<PaymentResponse>>>, ServiceError> {
    let payments = state
        .services
        .payments
        .get_payments_by_order(order_id)
        .await?;
    Ok(Json(ApiResponse::success(payments)))
}
