use crate::{
    errors::ServiceError,
    handlers::{
        extract::{ApiJson, ApiPath},
        AppState,
    },
    services::tables::{CreateTableRequest, TableResponse, UpdateTableRequest},
    ApiResponse,
};
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

pub async fn list_tables(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<TableResponse>>>, ServiceError> {
    let tables = state.services.tables.list_tables().await?;
    Ok(Json(ApiResponse::success(tables)))
}

pub async fn get_table(
    State(state): State<AppState>,
    ApiPath(table_id): ApiPath<i32>,
) -> Result<Json<ApiResponse<TableResponse>>, ServiceError> {
    let table = state.services.tables.get_table(table_id).await?;
    Ok(Json(ApiResponse::success(table)))
}

pub async fn create_table(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateTableRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TableResponse>>), ServiceError> {
    let table = state.services.tables.create_table(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(table, "Table created")),
    ))
}

pub async fn update_table(
    State(state): State<AppState>,
    ApiPath(table_id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateTableRequest>,
) -> Result<Json<ApiResponse<TableResponse>>, ServiceError> {
    let table = state.services.tables.update_table(table_id, request).await?;
    Ok(Json(ApiResponse::success(table)))
}

pub async fn delete_table(
    State(state): State<AppState>,
    ApiPath(table_id): ApiPath<i32>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.tables.delete_table(table_id).await?;
    Ok(Json(ApiResponse::message("Table deleted")))
}
