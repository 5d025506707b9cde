// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Parley workspace.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ParleyError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Opaque identifier of a conversation, assigned by the store on first persist.
    ConversationId
);

string_id!(
    /// Already-verified identity of the caller.
    UserId
);

string_id!(
    /// Opaque name of one generation backend; key into the provider state ledger.
    BackendId
);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Backend,
    Store,
}

/// Author of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One immutable entry of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
    timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a message stamped with the current instant.
    pub fn new(role: Role, content: impl Into<String>) -> Result<Self, ParleyError> {
        Self::at(role, content, Utc::now())
    }

    /// Creates a message with an explicit timestamp (used when loading from storage).
    pub fn at(
        role: Role,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ParleyError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(ParleyError::InvalidMessage(format!(
                "{role} message content must not be blank"
            )));
        }
        Ok(Self {
            role,
            content,
            timestamp,
        })
    }

    pub fn user(content: impl Into<String>) -> Result<Self, ParleyError> {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Result<Self, ParleyError> {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// A user's conversation: an append-only, ordered list of messages.
///
/// The identifier is absent until the conversation is first persisted and
/// never changes afterwards. `created_at <= updated_at` holds at all times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    id: Option<ConversationId>,
    user_id: UserId,
    messages: Vec<Message>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Starts an empty, not yet persisted conversation.
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            user_id,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a persisted conversation. Used by store implementations.
    pub fn restore(
        id: ConversationId,
        user_id: UserId,
        messages: Vec<Message>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ParleyError> {
        if updated_at < created_at {
            return Err(ParleyError::Internal(format!(
                "conversation {id} has updated_at before created_at"
            )));
        }
        Ok(Self {
            id: Some(id),
            user_id,
            messages,
            created_at,
            updated_at,
        })
    }

    pub fn id(&self) -> Option<&ConversationId> {
        self.id.as_ref()
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Appends a message and advances `updated_at`.
    pub fn push(&mut self, message: Message) {
        let stamp = message.timestamp();
        self.messages.push(message);
        self.touch(stamp);
    }

    /// Sets the identifier if none is set yet. Returns false if one was already assigned.
    pub fn assign_id(&mut self, id: ConversationId) -> bool {
        if self.id.is_some() {
            return false;
        }
        self.id = Some(id);
        true
    }

    /// Moves `updated_at` forward to `now`; never backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}
