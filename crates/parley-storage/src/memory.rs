// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process conversation store for tests and ephemeral sessions.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parley_core::{
    AdapterType, Conversation, ConversationId, ConversationStore, HealthStatus, ParleyError,
    PluginAdapter, StoreConflict, UserId,
};
use tokio::sync::RwLock;

/// Keeps conversations in a map. Same contract as the SQLite store,
/// nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.conversations.read().await.is_empty()
    }
}

#[async_trait]
impl PluginAdapter for MemoryConversationStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn save(&self, conversation: &Conversation) -> Result<Conversation, ParleyError> {
        let mut map = self.conversations.write().await;
        let id = conversation
            .id()
            .cloned()
            .unwrap_or_else(|| ConversationId(uuid::Uuid::new_v4().to_string()));

        let created_at = match map.get(&id) {
            Some(existing) => {
                if existing.user_id() != conversation.user_id() {
                    return Err(ParleyError::store(StoreConflict::OwnerChanged { id }));
                }
                if !conversation.messages().starts_with(existing.messages()) {
                    return Err(ParleyError::store(StoreConflict::StaleSnapshot {
                        id,
                        stored: existing.messages().len(),
                        incoming: conversation.messages().len(),
                    }));
                }
                existing.created_at()
            }
            None => conversation.created_at(),
        };
        let updated_at = conversation.updated_at().max(Utc::now()).max(created_at);

        let saved = Conversation::restore(
            id.clone(),
            conversation.user_id().clone(),
            conversation.messages().to_vec(),
            created_at,
            updated_at,
        )?;
        map.insert(id, saved.clone());
        Ok(saved)
    }

    async fn find_by_id(&self, id: &ConversationId) -> Result<Option<Conversation>, ParleyError> {
        Ok(self.conversations.read().await.get(id).cloned())
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Conversation>, ParleyError> {
        let map = self.conversations.read().await;
        let mut found: Vec<Conversation> = map
            .values()
            .filter(|c| c.user_id() == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.updated_at()
                .cmp(&a.updated_at())
                .then_with(|| a.id().cmp(&b.id()))
        });
        Ok(found)
    }

    async fn delete(&self, id: &ConversationId) -> Result<bool, ParleyError> {
        Ok(self.conversations.write().await.remove(id).is_some())
    }
}
