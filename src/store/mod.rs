//! Persistence layer: libSQL-backed storage for customers, products,
//! orders and wastage.

pub mod libsql_backend;
pub mod migrations;
pub mod seed;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::Database;
