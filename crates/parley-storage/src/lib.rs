// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation persistence for Parley.
//!
//! Provides the SQLite store (WAL mode, embedded refinery migrations, all
//! statements serialized on one background connection) and an in-memory
//! store with the same contract.

pub mod database;
pub mod memory;
pub mod migrations;
pub mod queries;
pub mod sqlite;

use std::sync::Arc;

use parley_config::{StorageBackend, StorageConfig};
use parley_core::{ConversationStore, ParleyError};

pub use database::Database;
pub use memory::MemoryConversationStore;
pub use sqlite::SqliteConversationStore;

/// Opens the store selected by `[storage].backend`.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn ConversationStore>, ParleyError> {
    match config.backend {
        StorageBackend::Sqlite => Ok(Arc::new(SqliteConversationStore::open(config).await?)),
        StorageBackend::Memory => Ok(Arc::new(MemoryConversationStore::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_is_selected() {
        let config = StorageConfig {
            backend: StorageBackend::Memory,
            ..StorageConfig::default()
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.name(), "memory");
    }
}
