pub mod analytics;
pub mod auth;
pub mod categories;
pub mod extract;
pub mod orders;
pub mod payments;
pub mod products;
pub mod tables;
pub mod users;

use crate::{
    auth::AuthService,
    db::DbPool,
    services::{
        AnalyticsService, CatalogService, OrderService, PaymentService, TableService, UserService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub tables: Arc<TableService>,
    pub catalog: Arc<CatalogService>,
    pub users: Arc<UserService>,
    pub analytics: Arc<AnalyticsService>,
    pub auth: Arc<AuthService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, auth_service: Arc<AuthService>) -> Self {
        Self {
            orders: Arc::new(OrderService::new(db_pool.clone())),
            payments: Arc::new(PaymentService::new(db_pool.clone())),
            tables: Arc::new(TableService::new(db_pool.clone())),
            catalog: Arc::new(CatalogService::new(db_pool.clone())),
            users: Arc::new(UserService::new(db_pool.clone())),
            analytics: Arc::new(AnalyticsService::new(db_pool)),
            auth: auth_service,
        }
    }
}
