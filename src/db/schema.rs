//! SQL DDL for the message ledger.

/// Base table. `id` is the upstream message id (or a content fingerprint)
/// and is the only duplicate guard; `processed_at` is RFC3339 once set.
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    chat TEXT,
    text TEXT,
    timestamp TEXT,
    processed_at TEXT DEFAULT NULL
)
"#;

/// Additive column migrations for ledgers created by older releases.
/// SQLite has no `ADD COLUMN IF NOT EXISTS`; a duplicate-column failure
/// means the column is already there.
pub const MIGRATIONS: &[&str] = &["ALTER TABLE messages ADD COLUMN processed_at TEXT DEFAULT NULL"];

/// SQLite reports an existing column with this message prefix.
pub(crate) const DUPLICATE_COLUMN: &str = "duplicate column name";
