//! Outward-facing adapters implementing the domain's port traits.

pub mod sqlite;
pub mod stdio_mcp;

pub use sqlite::{create_migrated_test_pool, create_pool, initialize_database, DatabaseError};
