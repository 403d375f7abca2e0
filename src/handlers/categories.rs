use crate::{
    errors::ServiceError,
    handlers::{
        extract::{ApiJson, ApiPath, ApiQuery},
        AppState,
    },
    services::catalog::{CategoryResponse, CreateCategoryRequest, UpdateCategoryRequest},
    ApiResponse,
};
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryListQuery {
    #[serde(default)]
    pub include_unavailable: bool,
}

pub async fn list_categories(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CategoryListQuery>,
) -> Result<Json<ApiResponse<Vec<CategoryResponse>>>, ServiceError> {
    let categories = state
        .services
        .catalog
        .list_categories(query.include_unavailable)
        .await?;
    Ok(Json(ApiResponse::success(categories)))
}

pub async fn get_category(
    State(state): State<AppState>,
    ApiPath(category_id): ApiPath<i32>,
) -> Result<Json<ApiResponse<CategoryResponse>>, ServiceError> {
    let category = state.services.catalog.get_category(category_id).await?;
    Ok(Json(ApiResponse::success(category)))
}

pub async fn create_category(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryResponse>>), ServiceError> {
    let category = state.services.catalog.create_category(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(category, "Category created")),
    ))
}

pub async fn update_category(
    State(state): State<AppState>,
    ApiPath(category_id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateCategoryRequest>,
) -> Result<Json<ApiResponse<CategoryResponse>>, ServiceError> {
    let category = state
        .services
        .catalog
        .update_category(category_id, request)
        .await?;
    Ok(Json(ApiResponse::success(category)))
}

/// Soft delete; refused while the category still has available products
pub async fn delete_category(
    State(state): State<AppState>,
    ApiPath(category_id): ApiPath<i32>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.catalog.delete_category(category_id).await?;
    Ok(Json(ApiResponse::message("Category deleted")))
}

pub async fn restore_category(
    State(state): State<AppState>,
    ApiPath(category_id): ApiPath<i32>,
) -> Result<Json<ApiResponse<CategoryResponse>>, ServiceError> {
    let category = state.services.catalog.restore_category(category_id).await?;
    Ok(Json(ApiResponse::success_with_message(
        category,
        "Category restored",
    )))
}
