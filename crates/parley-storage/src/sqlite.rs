// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SqliteConversationStore: ConversationStore backed by SQLite.

use async_trait::async_trait;
use chrono::Utc;
use parley_config::StorageConfig;
use parley_core::{
    AdapterType, Conversation, ConversationId, ConversationStore, HealthStatus, ParleyError,
    PluginAdapter, UserId,
};
use tracing::{debug, info};

use crate::database::{Database, flatten_call_err, map_tr_err};
use crate::queries::conversations;

/// SQLite-backed conversation store.
///
/// Every save is one transaction, so a crash never leaves a conversation
/// with half of a turn written.
#[derive(Clone)]
pub struct SqliteConversationStore {
    db: Database,
}

impl SqliteConversationStore {
    /// Opens the database configured in `[storage]`.
    pub async fn open(config: &StorageConfig) -> Result<Self, ParleyError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        info!(path = %config.database_path, "sqlite conversation store ready");
        Ok(Self { db })
    }

    /// Opens a throwaway in-memory database.
    pub async fn in_memory() -> Result<Self, ParleyError> {
        Ok(Self {
            db: Database::open_in_memory().await?,
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteConversationStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        let probe = self
            .db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT 1", [], |row| row.get(0))
            })
            .await;
        Ok(match probe {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        self.db.checkpoint().await
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn save(&self, conversation: &Conversation) -> Result<Conversation, ParleyError> {
        let snapshot = conversation.clone();
        let new_id = ConversationId(uuid::Uuid::new_v4().to_string());
        let saved = self
            .db
            .connection()
            .call(move |conn| conversations::save(conn, &snapshot, new_id, Utc::now()))
            .await
            .map_err(flatten_call_err)?;
        debug!(
            conversation_id = ?saved.id(),
            messages = saved.messages().len(),
            "conversation saved"
        );
        Ok(saved)
    }

    async fn find_by_id(&self, id: &ConversationId) -> Result<Option<Conversation>, ParleyError> {
        let id = id.clone();
        self.db
            .connection()
            .call(move |conn| conversations::find_by_id(conn, &id))
            .await
            .map_err(flatten_call_err)
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Conversation>, ParleyError> {
        let user_id = user_id.clone();
        self.db
            .connection()
            .call(move |conn| conversations::find_by_user(conn, &user_id))
            .await
            .map_err(flatten_call_err)
    }

    async fn delete(&self, id: &ConversationId) -> Result<bool, ParleyError> {
        let id = id.clone();
        self.db
            .connection()
            .call(move |conn| conversations::delete(conn, &id))
            .await
            .map_err(flatten_call_err)
    }
}
