//! Database module: the processed-message ledger.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL and additive migrations (SQLite)
//! - `sqlite.rs`: the `MessageLedger` store handle

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::MessageRecord;
pub use schema::{MIGRATIONS, SQLITE_INIT};
pub use sqlite::{MessageLedger, SqlitePool};
