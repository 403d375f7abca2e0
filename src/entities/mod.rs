pub mod category;
pub mod dining_table;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod user;

pub use order::OrderStatus;
pub use payment::PaymentType;
pub use user::Role;
