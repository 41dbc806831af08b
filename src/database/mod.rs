pub mod manager;
pub mod models;
pub mod mysql;
pub mod query_builder;
pub mod retry;
pub mod row;
pub mod store;
pub mod tables;

pub use manager::{DatabaseError, DatabaseManager};
pub use mysql::MySqlStore;
pub use retry::RetryPolicy;
pub use store::HelpdeskStore;
pub use tables::Tables;
