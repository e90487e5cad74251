//! Core database infrastructure
//!
//! - `DatabaseConn`: SQLite connection wrapper with configuration
//! - `SchemaManager`: schema initialization, index maintenance and metadata
//! - `SchemaStatus`: schema state enumeration

mod connection;
mod schema;

pub use connection::DatabaseConn;
pub use schema::{SchemaDefinitions, SchemaManager, SchemaStatus, SCHEMA_VERSION};
