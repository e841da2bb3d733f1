//! Database access: entities, sessions, and schema migrations

pub mod db;
pub mod migrations;
pub mod sessions;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
