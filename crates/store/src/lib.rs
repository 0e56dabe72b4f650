//! Checkpoint persistence for Parley.
//!
//! `backend = "sqlite"` (the default) writes to a single database file;
//! `backend = "memory"` keeps checkpoints for the life of the process.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryCheckpointStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCheckpointStore;

use parley_config::StoreConfig;
use parley_core::checkpoint::CheckpointStore;
use parley_core::error::StoreError;
use std::sync::Arc;

/// Open the store selected by configuration.
pub async fn build_from_config(config: &StoreConfig) -> Result<Arc<dyn CheckpointStore>, StoreError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryCheckpointStore::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Arc::new(SqliteCheckpointStore::new(&config.path).await?)),
        other => Err(StoreError::Storage(format!("Unsupported store backend '{other}'"))),
    }
}
