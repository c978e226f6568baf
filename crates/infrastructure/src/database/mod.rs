pub mod manager;
pub mod mapping;
pub mod sqlite;
