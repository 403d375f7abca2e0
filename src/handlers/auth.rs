use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::{extract::ApiJson, AppState},
    services::users::UserResponse,
    ApiResponse,
};
use axum::{extract::State, Json};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

/// Exchange username and password for a bearer token
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ServiceError> {
    payload.validate()?;

    let user = match state
        .services
        .users
        .authenticate(&payload.username, &payload.password)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            counter!("cafe_pos.auth.login_failures", 1);
            return Err(e);
        }
    };

    let token = state.services.auth.generate_token(&user)?;
    counter!("cafe_pos.auth.logins", 1, "role" => user.role.to_string());
    info!(user_id = user.id, role = %user.role, "User logged in");

    Ok(Json(ApiResponse::success(LoginResponse {
        token: token.token,
        token_type: token.token_type,
        expires_in: token.expires_in,
        user: user.into(),
    })))
}

/// The account behind the presented token
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<UserResponse>>, ServiceError> {
    let user = state.services.users.get_user(auth_user.user_id).await?;
    Ok(Json(ApiResponse::success(user)))
}
