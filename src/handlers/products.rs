use crate::{
    errors::ServiceError,
    handlers::{
        extract::{ApiJson, ApiPath, ApiQuery},
        AppState,
    },
    services::catalog::{CreateProductRequest, ProductFilter, ProductResponse, UpdateProductRequest},
    ApiResponse,
};
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

pub async fn list_products(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ProductFilter>,
) -> Result<Json<ApiResponse<Vec<ProductResponse>>>, ServiceError> {
    let products = state.services.catalog.list_products(filter).await?;
    Ok(Json(ApiResponse::success(products)))
}

pub async fn get_product(
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<i32>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    let product = state.services.catalog.get_product(product_id).await?;
    Ok(Json(ApiResponse::success(product)))
}

pub async fn create_product(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductResponse>>), ServiceError> {
    let product = state.services.catalog.create_product(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(product, "Product created")),
    ))
}

pub async fn update_product(
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateProductRequest>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    let product = state
        .services
        .catalog
        .update_product(product_id, request)
        .await?;
    Ok(Json(ApiResponse::success(product)))
}

pub async fn delete_product(
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<i32>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.catalog.delete_product(product_id).await?;
    Ok(Json(ApiResponse::message("Product deleted")))
}

pub async fn restore_product(
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<i32>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    let product = state.services.catalog.restore_product(product_id).await?;
    Ok(Json(ApiResponse::success_with_message(
        product,
        "Product restored",
    )))
}
