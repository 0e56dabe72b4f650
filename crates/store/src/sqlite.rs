//! SQLite checkpoint store.
//!
//! One table, `checkpoints`, with one row per saved turn:
//!
//! ```text
//! id | thread_id | seq | messages (JSON) | created_at (RFC 3339)
//! ```
//!
//! `(thread_id, seq)` is unique. Writes are serialized through a mutex so
//! sequence numbers stay gap-free even when several threads save at once;
//! WAL mode keeps readers unblocked.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::checkpoint::{Checkpoint, CheckpointMeta, CheckpointStore, validate_thread_id};
use parley_core::error::StoreError;
use parley_core::message::{Message, ThreadId};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct SqliteCheckpointStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteCheckpointStore {
    /// Open (or create) the database at `path`.
    ///
    /// Accepts a plain file path, a `sqlite:` URL, or `":memory:"` for an
    /// ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let in_memory = path.contains(":memory:");
        let options = if in_memory || path.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(path)
                .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
        } else {
            SqliteConnectOptions::new().filename(path)
        };
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // An in-memory database lives only as long as its connection.
        let max_connections = if in_memory { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(if in_memory { 1 } else { 0 })
            .idle_timeout(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self::from_pool(pool).await?;
        info!("SQLite checkpoint store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self {
            pool,
            write_lock: Mutex::new(()),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_id   TEXT NOT NULL,
                seq         INTEGER NOT NULL,
                messages    TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE (thread_id, seq)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("checkpoints table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn parse_timestamp(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_checkpoint(row: &sqlx::sqlite::SqliteRow) -> Result<Checkpoint, StoreError> {
        let thread_id: String = row
            .try_get("thread_id")
            .map_err(|e| StoreError::QueryFailed(format!("thread_id column: {e}")))?;
        let seq: i64 = row
            .try_get("seq")
            .map_err(|e| StoreError::QueryFailed(format!("seq column: {e}")))?;
        let messages_json: String = row
            .try_get("messages")
            .map_err(|e| StoreError::QueryFailed(format!("messages column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        let messages: Vec<Message> =
            serde_json::from_str(&messages_json).map_err(|e| StoreError::Corrupt {
                thread_id: thread_id.clone(),
                reason: format!("checkpoint {seq}: {e}"),
            })?;

        Ok(Checkpoint {
            thread_id: ThreadId(thread_id),
            seq: seq as u64,
            messages,
            created_at: Self::parse_timestamp(&created_at),
        })
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn save(&self, thread_id: &ThreadId, messages: &[Message]) -> Result<Checkpoint, StoreError> {
        validate_thread_id(thread_id)?;
        let payload = serde_json::to_string(messages)
            .map_err(|e| StoreError::Storage(format!("Message serialization: {e}")))?;
        let created_at = Utc::now();

        let _guard = self.write_lock.lock().await;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("Begin transaction: {e}")))?;

        let next: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM checkpoints WHERE thread_id = ?",
        )
        .bind(thread_id.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Next seq: {e}")))?;

        sqlx::query(
            "INSERT INTO checkpoints (thread_id, seq, messages, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(thread_id.as_str())
        .bind(next)
        .bind(&payload)
        .bind(created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("Insert checkpoint: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("Commit checkpoint: {e}")))?;

        debug!(thread_id = %thread_id, seq = next, messages = messages.len(), "Checkpoint saved");
        Ok(Checkpoint {
            thread_id: thread_id.clone(),
            seq: next as u64,
            messages: messages.to_vec(),
            created_at,
        })
    }

    async fn latest(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, StoreError> {
        let row = sqlx::query(
            "SELECT thread_id, seq, messages, created_at FROM checkpoints
             WHERE thread_id = ? ORDER BY seq DESC LIMIT 1",
        )
        .bind(thread_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Latest checkpoint: {e}")))?;

        row.as_ref().map(Self::row_to_checkpoint).transpose()
    }

    async fn list(&self, thread_id: &ThreadId) -> Result<Vec<CheckpointMeta>, StoreError> {
        let rows = sqlx::query(
            "SELECT seq, json_array_length(messages) AS message_count, created_at
             FROM checkpoints WHERE thread_id = ? ORDER BY seq ASC",
        )
        .bind(thread_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("List checkpoints: {e}")))?;

        rows.iter()
            .map(|row| {
                let seq: i64 = row
                    .try_get("seq")
                    .map_err(|e| StoreError::QueryFailed(format!("seq column: {e}")))?;
                let count: i64 = row
                    .try_get("message_count")
                    .map_err(|e| StoreError::QueryFailed(format!("message_count column: {e}")))?;
                let created_at: String = row
                    .try_get("created_at")
                    .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;
                Ok(CheckpointMeta {
                    thread_id: thread_id.clone(),
                    seq: seq as u64,
                    message_count: count as usize,
                    created_at: Self::parse_timestamp(&created_at),
                })
            })
            .collect()
    }

    async fn list_thread_ids(&self) -> Result<Vec<ThreadId>, StoreError> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT thread_id FROM checkpoints ORDER BY thread_id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::QueryFailed(format!("List threads: {e}")))?;
        Ok(ids.into_iter().map(ThreadId).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::message::MessageToolCall;
    use std::sync::Arc;

    async fn test_store() -> SqliteCheckpointStore {
        SqliteCheckpointStore::new("sqlite::memory:").await.unwrap()
    }

    fn turn() -> Vec<Message> {
        vec![
            Message::user("What is 6 times 7?"),
            Message::assistant_tool_calls(
                "",
                vec![MessageToolCall {
                    id: "call_1".into(),
                    name: "calculator".into(),
                    arguments: r#"{"first_num":6,"second_num":7,"operation":"mul"}"#.into(),
                }],
            ),
            Message::tool_result("call_1", r#"{"result":42.0}"#),
            Message::assistant("42"),
        ]
    }

    #[tokio::test]
    async fn save_and_load_latest() {
        let store = test_store().await;
        let t = ThreadId::from("thread-a");

        let cp = store.save(&t, &turn()).await.unwrap();
        assert_eq!(cp.seq, 1);

        let latest = store.latest(&t).await.unwrap().unwrap();
        assert_eq!(latest.seq, 1);
        assert_eq!(latest.messages, turn());
        assert_eq!(latest.messages[1].tool_calls[0].name, "calculator");
        assert_eq!(latest.messages[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn latest_returns_highest_seq() {
        let store = test_store().await;
        let t = ThreadId::from("thread-b");
        store.save(&t, &[Message::user("one")]).await.unwrap();
        store
            .save(&t, &[Message::user("one"), Message::assistant("two")])
            .await
            .unwrap();

        let latest = store.latest(&t).await.unwrap().unwrap();
        assert_eq!(latest.seq, 2);
        assert_eq!(latest.messages.len(), 2);

        let metas = store.list(&t).await.unwrap();
        assert_eq!(metas.iter().map(|m| m.seq).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(metas[0].message_count, 1);
        assert_eq!(metas[1].message_count, 2);
    }

    #[tokio::test]
    async fn threads_are_isolated() {
        let store = test_store().await;
        store.save(&ThreadId::from("x"), &[Message::user("x")]).await.unwrap();
        store.save(&ThreadId::from("y"), &[Message::user("y")]).await.unwrap();

        let x = store.latest(&ThreadId::from("x")).await.unwrap().unwrap();
        assert_eq!(x.seq, 1);
        assert_eq!(x.messages[0].content, "x");
        assert!(store.latest(&ThreadId::from("z")).await.unwrap().is_none());
        assert_eq!(
            store.list_thread_ids().await.unwrap(),
            vec![ThreadId::from("x"), ThreadId::from("y")]
        );
    }

    #[tokio::test]
    async fn concurrent_saves_keep_seq_gap_free() {
        let store = Arc::new(test_store().await);
        let t = ThreadId::from("busy");
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let t = t.clone();
                tokio::spawn(async move { store.save(&t, &[Message::user(format!("{i}"))]).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let seqs: Vec<u64> = store.list(&t).await.unwrap().iter().map(|m| m.seq).collect();
        assert_eq!(seqs, (1..=8).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.db");
        let path = path.to_str().unwrap();
        let t = ThreadId::from("durable");

        {
            let store = SqliteCheckpointStore::new(path).await.unwrap();
            store.save(&t, &turn()).await.unwrap();
        }

        let reopened = SqliteCheckpointStore::new(path).await.unwrap();
        let latest = reopened.latest(&t).await.unwrap().unwrap();
        assert_eq!(latest.messages.len(), 4);
        let next = reopened.save(&t, &turn()).await.unwrap();
        assert_eq!(next.seq, 2);
    }

    #[tokio::test]
    async fn corrupt_payload_is_reported() {
        let store = test_store().await;
        sqlx::query(
            "INSERT INTO checkpoints (thread_id, seq, messages, created_at) VALUES ('bad', 1, 'not json', '2024-01-01T00:00:00Z')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let err = store.latest(&ThreadId::from("bad")).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn rejects_blank_thread_id() {
        let store = test_store().await;
        let err = store.save(&ThreadId::from("  "), &turn()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidThreadId(_)));
    }
}
