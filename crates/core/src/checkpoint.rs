//! Checkpoint store trait: durable snapshots of conversation threads.
//!
//! Every completed turn writes one checkpoint holding the thread's full
//! message sequence. Only the latest checkpoint is needed to resume;
//! older ones are kept and never pruned by the store itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::StoreError;
use crate::message::{Message, ThreadId};

/// A persisted snapshot of one thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: ThreadId,

    /// Per-thread sequence number, starting at 1
    pub seq: u64,

    /// The full ordered message log at the time of the snapshot
    pub messages: Vec<Message>,

    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn meta(&self) -> CheckpointMeta {
        CheckpointMeta {
            thread_id: self.thread_id.clone(),
            seq: self.seq,
            message_count: self.messages.len(),
            created_at: self.created_at,
        }
    }
}

/// Checkpoint summary without the message payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub thread_id: ThreadId,
    pub seq: u64,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Durable storage for thread checkpoints.
///
/// Implementations: SQLite (sqlx) and in-memory.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Store the full message sequence as a new checkpoint for `thread_id`.
    async fn save(&self, thread_id: &ThreadId, messages: &[Message]) -> Result<Checkpoint, StoreError>;

    /// The most recent checkpoint of a thread, if any.
    async fn latest(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, StoreError>;

    /// All checkpoints of a thread, oldest first.
    async fn list(&self, thread_id: &ThreadId) -> Result<Vec<CheckpointMeta>, StoreError>;

    /// Every distinct thread id ever checkpointed, sorted.
    async fn list_thread_ids(&self) -> Result<Vec<ThreadId>, StoreError>;
}

/// Reject thread ids that cannot be stored or displayed safely.
pub fn validate_thread_id(thread_id: &ThreadId) -> Result<(), StoreError> {
    let id = thread_id.as_str();
    if id.trim().is_empty() {
        return Err(StoreError::InvalidThreadId("thread id cannot be empty".into()));
    }
    if id.chars().any(|c| c.is_control()) {
        return Err(StoreError::InvalidThreadId(format!(
            "thread id contains control characters: {id:?}"
        )));
    }
    Ok(())
}
