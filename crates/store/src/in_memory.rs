//! In-memory checkpoint store: for tests and `backend = "memory"`.

use async_trait::async_trait;
use chrono::Utc;
use parley_core::checkpoint::{Checkpoint, CheckpointMeta, CheckpointStore, validate_thread_id};
use parley_core::error::StoreError;
use parley_core::message::{Message, ThreadId};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Keeps every checkpoint in a map keyed by thread. Lost on exit.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    threads: RwLock<BTreeMap<ThreadId, Vec<Checkpoint>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn save(&self, thread_id: &ThreadId, messages: &[Message]) -> Result<Checkpoint, StoreError> {
        validate_thread_id(thread_id)?;
        let mut threads = self.threads.write().await;
        let history = threads.entry(thread_id.clone()).or_default();
        let checkpoint = Checkpoint {
            thread_id: thread_id.clone(),
            seq: history.len() as u64 + 1,
            messages: messages.to_vec(),
            created_at: Utc::now(),
        };
        history.push(checkpoint.clone());
        Ok(checkpoint)
    }

    async fn latest(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, StoreError> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).and_then(|h| h.last().cloned()))
    }

    async fn list(&self, thread_id: &ThreadId) -> Result<Vec<CheckpointMeta>, StoreError> {
        let threads = self.threads.read().await;
        Ok(threads
            .get(thread_id)
            .map(|h| h.iter().map(Checkpoint::meta).collect())
            .unwrap_or_default())
    }

    async fn list_thread_ids(&self) -> Result<Vec<ThreadId>, StoreError> {
        Ok(self.threads.read().await.keys().cloned().collect())
    }
}
