#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use cafe_pos_api::{
    auth::AuthService,
    build_router,
    config::AppConfig,
    db::{self, DbConfig},
    entities::{user, Role},
    services::{
        catalog::{CategoryResponse, CreateCategoryRequest, CreateProductRequest, ProductResponse},
        tables::{CreateTableRequest, TableResponse},
    },
    AppState,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration_secret_for_cafe_pos_tests_k3j9x7";
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Argon2 is slow in debug builds; hash the shared test password once.
fn test_password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| {
        AuthService::hash_password(TEST_PASSWORD).expect("hash test password")
    })
}

/// A seeded account with a ready-made bearer token
pub struct TestUser {
    pub id: i32,
    pub username: String,
    pub token: String,
}

/// Application harness backed by a private in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub staff: TestUser,
    pub cashier: TestUser,
    pub manager: TestUser,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_config = DbConfig::in_memory();
        let cfg = AppConfig::new(
            db_config.url.clone(),
            TEST_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );

        let pool = db::establish_connection_with_config(&db_config)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);

        let staff = Self::seed_user(&state, "sam", "Sam Staff", Role::Staff).await;
        let cashier = Self::seed_user(&state, "casey", "Casey Cashier", Role::Cashier).await;
        let manager = Self::seed_user(&state, "morgan", "Morgan Manager", Role::Manager).await;

        let router = build_router(state.clone());

        Self {
            router,
            state,
            staff,
            cashier,
            manager,
        }
    }

    async fn seed_user(state: &AppState, username: &str, full_name: &str, role: Role) -> TestUser {
        let model = user::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(test_password_hash().to_string()),
            full_name: Set(full_name.to_string()),
            role: Set(role),
            active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*state.db)
        .await
        .expect("seed test user");

        let token = state
            .services
            .auth
            .generate_token(&model)
            .expect("issue test token")
            .token;

        TestUser {
            id: model.id,
            username: model.username,
            token,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.send(request).await
    }

    /// Send a fully built request
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn as_staff(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(&self.staff.token)).await
    }

    pub async fn as_cashier(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(&self.cashier.token))
            .await
    }

    pub async fn as_manager(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(&self.manager.token))
            .await
    }

    pub async fn seed_table(&self, name: &str) -> TableResponse {
        self.state
            .services
            .tables
            .create_table(CreateTableRequest {
                name: name.to_string(),
                capacity: 4,
                description: None,
            })
            .await
            .expect("seed table")
    }

    pub async fn seed_category(&self, name: &str) -> CategoryResponse {
        self.state
            .services
            .catalog
            .create_category(CreateCategoryRequest {
                name: name.to_string(),
                description: None,
            })
            .await
            .expect("seed category")
    }

    pub async fn seed_product(&self, category_id: i32, name: &str, price: Decimal) -> ProductResponse {
        self.state
            .services
            .catalog
            .create_product(CreateProductRequest {
                name: name.to_string(),
                price,
                category_id,
                image_url: None,
            })
            .await
            .expect("seed product")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Decimals travel as JSON strings
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("expected a decimal, got {}", other),
    }
}
