//! Café POS API Library
//!
//! Order taking, settlement and back-office for a small café or bar: dining
//! tables, a menu of categories and products, staff accounts and reporting.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use chrono::Utc;
use http::HeaderValue;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};

use crate::auth::AuthRouterExt;
use crate::db::DbPool;
use crate::entities::Role;
use crate::tracing::configure_http_tracing;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(db: Arc<DbPool>, config: config::AppConfig) -> Self {
        let auth_service = Arc::new(auth::AuthService::new(auth::AuthConfig::from(&config)));
        let services = handlers::AppServices::new(db.clone(), auth_service);
        Self {
            db,
            config,
            services,
        }
    }
}

// Common response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success(data)
        }
    }
}

impl ApiResponse<()> {
    /// Success without a payload, e.g. after a delete
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Every `/api/v1` route, gated by the minimum role on the ladder
/// Staff < Cashier < Manager.
pub fn api_v1_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .route("/health", get(health_check))
        .route("/status", get(api_status));

    // Floor staff: orders plus read access to the floor plan and menu
    let staff = Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::create_order),
        )
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/:id/items",
            get(handlers::orders::list_order_items).post(handlers::orders::add_order_item),
        )
        .route(
            "/orders/:id/items/:item_id",
            put(handlers::orders::update_order_item).delete(handlers::orders::remove_order_item),
        )
        .route(
            "/orders/:id/status",
            put(handlers::orders::update_order_status),
        )
        .route("/tables", get(handlers::tables::list_tables))
        .route("/tables/:id", get(handlers::tables::get_table))
        .route("/categories", get(handlers::categories::list_categories))
        .route("/categories/:id", get(handlers::categories::get_category))
        .route("/products", get(handlers::products::list_products))
        .route("/products/:id", get(handlers::products::get_product))
        .with_role(Role::Staff);

    let cashier = Router::new()
        .route(
            "/payments",
            get(handlers::payments::list_payments).post(handlers::payments::create_payment),
        )
        .route("/payments/:id", get(handlers::payments::get_payment))
        .route(
            "/payments/order/:order_id",
            get(handlers::payments::get_payments_by_order),
        )
        .with_role(Role::Cashier);

    let manager = Router::new()
        .route("/tables", post(handlers::tables::create_table))
        .route(
            "/tables/:id",
            put(handlers::tables::update_table).delete(handlers::tables::delete_table),
        )
        .route("/categories", post(handlers::categories::create_category))
        .route(
            "/categories/:id",
            put(handlers::categories::update_category)
                .delete(handlers::categories::delete_category),
        )
        .route(
            "/categories/:id/restore",
            post(handlers::categories::restore_category),
        )
        .route("/products", post(handlers::products::create_product))
        .route(
            "/products/:id",
            put(handlers::products::update_product).delete(handlers::products::delete_product),
        )
        .route(
            "/products/:id/restore",
            post(handlers::products::restore_product),
        )
        .route(
            "/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route(
            "/users/:id",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route("/analytics/summary", get(handlers::analytics::sales_summary))
        .route(
            "/analytics/revenue-by-day",
            get(handlers::analytics::revenue_by_day),
        )
        .route(
            "/analytics/top-products",
            get(handlers::analytics::top_products),
        )
        .route(
            "/analytics/payment-types",
            get(handlers::analytics::payment_types),
        )
        .with_role(Role::Manager);

    public.merge(staff).merge(cashier).merge(manager)
}

/// CORS from config: explicit origins, or permissive in development or
/// when opted in. Otherwise cross-origin requests are not allowed.
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let configured_origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !configured_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(configured_origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            environment = %cfg.environment,
            "Using permissive CORS because explicit origins were not configured"
        );
        CorsLayer::permissive()
    } else {
        ::tracing::warn!("No CORS origins configured; cross-origin requests will be rejected");
        CorsLayer::new()
    }
}

/// The full application router with its middleware stack
pub fn build_router(state: AppState) -> Router {
    let auth_service = state.services.auth.clone();
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(|| async { "cafe-pos-api up" }))
        .nest("/api/v1", api_v1_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors)
        // Auth middleware reads the service from request extensions
        .layer(Extension(auth_service))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status(State(state): State<AppState>) -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "cafe-pos-api",
        "environment": state.config.environment,
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(()) => "healthy",
        Err(e) => {
            ::tracing::warn!(error = %e, "Database health check failed");
            "unhealthy"
        }
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

pub mod prelude {
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::services::*;
    pub use crate::{build_router, ApiResponse, ApiResult, AppState};
}
