pub mod database;
pub mod http;

pub use database::{manager::DatabaseManager, sqlite::SqliteJobRepository};
pub use http::{HttpManagerClient, HttpNodeClient};
