use crate::{
    auth::AuthUser,
    entities::OrderStatus,
    errors::ServiceError,
    handlers::{
        extract::{ApiJson, ApiPath, ApiQuery},
        AppState,
    },
    services::orders::{
        AddOrderItemRequest, AddOrderItemResponse, CreateOrderRequest, OrderDetailResponse,
        OrderFilter, OrderItemResponse, OrderResponse, RemoveItemResponse, StatusUpdateResponse,
        UpdateOrderItemRequest, UpdateOrderStatusRequest,
    },
    ApiResponse,
};
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use std::str::FromStr;
use tracing::info;
use validator::Validate;

/// Open a new order on a table for the authenticated user
pub async fn create_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiJson(request): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    request.validate()?;

    let order = state
        .services
        .orders
        .create_order(request.table_id, auth_user.user_id)
        .await?;

    info!(order_id = order.id, user_id = auth_user.user_id, "Order opened");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(order, "Order created")),
    ))
}

pub async fn list_orders(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<OrderFilter>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, ServiceError> {
    let orders = state.services.orders.list_orders(filter).await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Order with its lines and a computed summary
pub async fn get_order(
    State(state): State<AppState>,
    ApiPath(order_id): ApiPath<i32>,
) -> Result<Json<ApiResponse<OrderDetailResponse>>, ServiceError> {
    let order = state.services.orders.get_order(order_id).await?;
    Ok(Json(ApiResponse::success(order)))
}

pub async fn list_order_items(
    State(state): State<AppState>,
    ApiPath(order_id): ApiPath<i32>,
) -> Result<Json<ApiResponse<Vec<OrderItemResponse>>>, ServiceError> {
    let items = state.services.orders.list_items(order_id).await?;
    Ok(Json(ApiResponse::success(items)))
}

pub async fn add_order_item(
    State(state): State<AppState>,
    ApiPath(order_id): ApiPath<i32>,
    ApiJson(request): ApiJson<AddOrderItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AddOrderItemResponse>>), ServiceError> {
    request.validate()?;

    let added = state
        .services
        .orders
        .add_order_item(order_id, request.product_id, request.quantity, request.notes)
        .await?;

    let message = if added.merged {
        "Quantity added to existing line"
    } else {
        "Item added"
    };
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(added, message)),
    ))
}

pub async fn update_order_item(
    State(state): State<AppState>,
    ApiPath((order_id, item_id)): ApiPath<(i32, i32)>,
    ApiJson(request): ApiJson<UpdateOrderItemRequest>,
) -> Result<Json<ApiResponse<OrderItemResponse>>, ServiceError> {
    request.validate()?;

    let item = state
        .services
        .orders
        .update_order_item(order_id, item_id, request.quantity, request.notes)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}

/// Removing the last line cancels the order
pub async fn remove_order_item(
    State(state): State<AppState>,
    ApiPath((order_id, item_id)): ApiPath<(i32, i32)>,
) -> Result<Json<ApiResponse<RemoveItemResponse>>, ServiceError> {
    let removed = state
        .services
        .orders
        .remove_order_item(order_id, item_id)
        .await?;

    let message = if removed.order_cancelled {
        "Item removed; order cancelled because it has no items left"
    } else {
        "Item removed"
    };
    Ok(Json(ApiResponse::success_with_message(removed, message)))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    ApiPath(order_id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<StatusUpdateResponse>>, ServiceError> {
    let status = OrderStatus::from_str(request.status.trim()).map_err(|_| {
        ServiceError::ValidationError(format!(
            "Unknown order status '{}'; expected Ordering, Paid or Cancelled",
            request.status
        ))
    })?;

    let updated = state
        .services
        .orders
        .update_status(order_id, status)
        .await?;

    let message = if updated.already_in_status {
        format!("Order is already {}", status)
    } else {
        format!("Order is now {}", status)
    };
    Ok(Json(ApiResponse::success_with_message(updated, message)))
}
