// Order lifecycle
pub mod order_status;
pub mod orders;
pub mod payments;

// Floor plan, menu and staff
pub mod catalog;
pub mod tables;
pub mod users;

// Reporting
pub mod analytics;

pub use analytics::AnalyticsService;
pub use catalog::CatalogService;
pub use orders::OrderService;
pub use payments::PaymentService;
pub use tables::TableService;
pub use users::UserService;
