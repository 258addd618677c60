//! Persistence layer — libSQL-backed profile and activity storage.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{ActivityStats, ProfileStore};
