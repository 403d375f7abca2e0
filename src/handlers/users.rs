use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::{
        extract::{ApiJson, ApiPath},
        AppState,
    },
    services::users::{CreateUserRequest, UpdateUserRequest, UserResponse},
    ApiResponse,
};
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use tracing::info;

pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, ServiceError> {
    let users = state.services.users.list_users().await?;
    Ok(Json(ApiResponse::success(users)))
}

pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i32>,
) -> Result<Json<ApiResponse<UserResponse>>, ServiceError> {
    let user = state.services.users.get_user(user_id).await?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn create_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ServiceError> {
    let user = state.services.users.create_user(request).await?;
    info!(user_id = user.id, created_by = auth_user.user_id, "Staff account created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(user, "User created")),
    ))
}

pub async fn update_user(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ServiceError> {
    let user = state.services.users.update_user(user_id, request).await?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(user_id): ApiPath<i32>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state
        .services
        .users
        .delete_user(user_id, auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::message("User deleted")))
}
