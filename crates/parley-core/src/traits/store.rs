// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation store trait.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Conversation, ConversationId, UserId};

/// Durable home of conversations.
///
/// All failures surface as [`ParleyError::Store`].
#[async_trait]
pub trait ConversationStore: PluginAdapter {
    /// Persists the conversation and returns the stored copy.
    ///
    /// Assigns an identifier when absent and advances `updated_at`. Messages
    /// already stored are never rewritten; only new ones are appended.
    async fn save(&self, conversation: &Conversation) -> Result<Conversation, ParleyError>;

    /// Loads a conversation with all of its messages.
    async fn find_by_id(&self, id: &ConversationId) -> Result<Option<Conversation>, ParleyError>;

    /// Lists a user's conversations, most recently updated first.
    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Conversation>, ParleyError>;

    /// Removes a conversation and its messages. Returns false if it did not exist.
    async fn delete(&self, id: &ConversationId) -> Result<bool, ParleyError>;
}
