use crate::db::models::{MessageRecord, format_timestamp};
use crate::db::schema::{DUPLICATE_COLUMN, MIGRATIONS, SQLITE_INIT};
use crate::error::{CourierError, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tracing::{debug, error, info};

pub type SqlitePool = Pool<Sqlite>;

/// Durable record of every message that has been ingested.
///
/// The handle is cheap to clone and is passed explicitly to whatever needs
/// it. `is_processed` is only a hint: the primary key on `id` is what keeps
/// a message from being recorded twice, also across processes.
#[derive(Clone)]
pub struct MessageLedger {
    pool: SqlitePool,
}

impl MessageLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the SQLite database at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;
        debug!(database_url = %database_url, "ledger connected");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the table and apply additive migrations. Safe to run on every
    /// start. A migration failure other than "column exists" is logged and
    /// returned as [`CourierError::SchemaMigration`]; existing rows are never
    /// touched.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(SQLITE_INIT).execute(&self.pool).await?;

        for stmt in MIGRATIONS {
            match sqlx::query(stmt).execute(&self.pool).await {
                Ok(_) => info!(migration = %stmt, "ledger schema migrated"),
                Err(e) if is_duplicate_column(&e) => {
                    debug!(migration = %stmt, "migration already applied");
                }
                Err(e) => {
                    error!(migration = %stmt, error = %e, "ledger schema migration failed");
                    return Err(CourierError::SchemaMigration(e.to_string()));
                }
            }
        }
        Ok(())
    }

    pub async fn is_processed(&self, id: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Insert a new record. Fails with [`CourierError::DuplicateRecord`] when
    /// `id` is already present; the stored row is left as it was.
    pub async fn save(
        &self,
        id: &str,
        chat: &str,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let res = sqlx::query("INSERT INTO messages (id, chat, text, timestamp) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(chat)
            .bind(text)
            .bind(format_timestamp(&timestamp))
            .execute(&self.pool)
            .await;

        match res {
            Ok(_) => {
                debug!(id = %id, chat = %chat, "message recorded");
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => {
                Err(CourierError::DuplicateRecord { id: id.to_string() })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<MessageRecord>> {
        let rec = sqlx::query_as::<_, MessageRecord>(
            r#"SELECT id, chat, text, timestamp, processed_at
               FROM messages WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec)
    }

    /// Stamp `processed_at`. Returns `false` when no such message exists.
    pub async fn mark_processed(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let res = sqlx::query("UPDATE messages SET processed_at = ? WHERE id = ?")
            .bind(format_timestamp(&at))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64> {
        let rec: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(rec.0)
    }

    /// Close the pool; pending connections are drained first.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() || db.message().contains("UNIQUE constraint failed")
        }
        _ => false,
    }
}

fn is_duplicate_column(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.message().contains(DUPLICATE_COLUMN),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    async fn open_ledger() -> (TempDir, MessageLedger) {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite:{}", dir.path().join("ledger.sqlite").display());
        let ledger = MessageLedger::connect(&url).await.expect("connect ledger");
        ledger.initialize().await.expect("initialize ledger");
        (dir, ledger)
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 3, 6, 15, 42).unwrap()
    }

    #[tokio::test]
    async fn saved_message_is_processed() {
        let (_dir, ledger) = open_ledger().await;
        assert!(!ledger.is_processed("m-1").await.unwrap());

        ledger.save("m-1", "reports", "Поле 3, пахота 40 га", ts()).await.unwrap();

        assert!(ledger.is_processed("m-1").await.unwrap());
        assert!(!ledger.is_processed("m-2").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_save_fails_and_keeps_first_record() {
        let (_dir, ledger) = open_ledger().await;
        ledger.save("m-1", "reports", "first", ts()).await.unwrap();

        let later = ts() + chrono::Duration::hours(2);
        let err = ledger.save("m-1", "other-chat", "second", later).await.unwrap_err();
        assert!(matches!(err, CourierError::DuplicateRecord { ref id } if id == "m-1"));

        let stored = ledger.get("m-1").await.unwrap().expect("record present");
        assert_eq!(stored, MessageRecord::new("m-1", "reports", "first", ts()));
        assert_eq!(ledger.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn initialize_is_repeatable_without_data_loss() {
        let (_dir, ledger) = open_ledger().await;
        ledger.save("a", "c", "t", ts()).await.unwrap();
        ledger.save("b", "c", "t", ts()).await.unwrap();

        for _ in 0..3 {
            ledger.initialize().await.unwrap();
        }

        assert_eq!(ledger.count().await.unwrap(), 2);
        assert!(ledger.is_processed("a").await.unwrap());
    }

    #[tokio::test]
    async fn initialize_adds_processed_at_to_legacy_table() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("legacy.sqlite").display());
        let ledger = MessageLedger::connect(&url).await.unwrap();

        sqlx::query("CREATE TABLE messages (id TEXT PRIMARY KEY, chat TEXT, text TEXT, timestamp TEXT)")
            .execute(ledger.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO messages (id, chat, text, timestamp) VALUES ('old', 'c', 't', '2023-01-01T00:00:00.000Z')")
            .execute(ledger.pool())
            .await
            .unwrap();

        ledger.initialize().await.unwrap();

        let old = ledger.get("old").await.unwrap().expect("legacy row kept");
        assert_eq!(old.processed_at, None);
        assert_eq!(old.text, "t");

        assert!(ledger.mark_processed("old", ts()).await.unwrap());
        let old = ledger.get("old").await.unwrap().unwrap();
        assert_eq!(old.processed_at_utc(), Some(ts()));
    }

    #[tokio::test]
    async fn failed_migration_is_reported_and_leaves_rows_alone() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("view.sqlite").display());
        let ledger = MessageLedger::connect(&url).await.unwrap();

        sqlx::query("CREATE TABLE base (id TEXT PRIMARY KEY, chat TEXT, text TEXT, timestamp TEXT)")
            .execute(ledger.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO base VALUES ('kept', 'c', 't', '2023-01-01T00:00:00.000Z')")
            .execute(ledger.pool())
            .await
            .unwrap();
        sqlx::query("CREATE VIEW messages AS SELECT * FROM base")
            .execute(ledger.pool())
            .await
            .unwrap();

        let err = ledger.initialize().await.unwrap_err();
        assert!(matches!(err, CourierError::SchemaMigration(_)), "{err}");
        assert!(!err.is_fatal());

        let rows: Vec<(String, String)> = sqlx::query_as("SELECT id, text FROM base")
            .fetch_all(ledger.pool())
            .await
            .unwrap();
        assert_eq!(rows, vec![("kept".to_string(), "t".to_string())]);
        assert!(ledger.is_processed("kept").await.unwrap());
    }

    #[tokio::test]
    async fn mark_processed_unknown_id_is_false() {
        let (_dir, ledger) = open_ledger().await;
        assert!(!ledger.mark_processed("nope", ts()).await.unwrap());
    }

    #[tokio::test]
    async fn records_survive_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("ledger.sqlite").display());

        let ledger = MessageLedger::connect(&url).await.unwrap();
        ledger.initialize().await.unwrap();
        ledger.save("persisted", "c", "t", ts()).await.unwrap();
        ledger.close().await;

        let reopened = MessageLedger::connect(&url).await.unwrap();
        reopened.initialize().await.unwrap();
        assert!(reopened.is_processed("persisted").await.unwrap());
    }
}
