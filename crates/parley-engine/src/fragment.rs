// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Caller-facing fragments of a streamed reply.

use serde::{Deserialize, Serialize};

use parley_core::{BackendId, ConversationId, ParleyError};

/// One item of a streamed reply.
///
/// A well-formed stream is `Started`, any number of `Text`/`Restart`, then
/// exactly one of `Done` or `Error`. An `Error` may also arrive alone when the
/// turn could not begin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFragment {
    /// The user turn is durable; carries the conversation to follow up on.
    Started { conversation_id: ConversationId },
    Text { text: String },
    /// Discard text received so far; the reply restarts on `backend`.
    Restart { backend: BackendId },
    Done {
        conversation_id: ConversationId,
        backend: BackendId,
        truncated: bool,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<ConversationId>,
        kind: String,
        message: String,
    },
}

impl StreamFragment {
    pub fn error(conversation_id: Option<ConversationId>, error: &ParleyError) -> Self {
        Self::Error {
            conversation_id,
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }

    /// True for `Done` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let text = StreamFragment::Text { text: "hi".into() };
        assert_eq!(
            serde_json::to_value(&text).unwrap(),
            serde_json::json!({"type": "text", "text": "hi"})
        );

        let done = StreamFragment::Done {
            conversation_id: ConversationId::from("c1"),
            backend: BackendId::from("echo"),
            truncated: false,
        };
        let value = serde_json::to_value(&done).unwrap();
        assert_eq!(value["type"], "done");
        assert_eq!(value["conversation_id"], "c1");
    }

    #[test]
    fn error_fragment_carries_kind() {
        let err = ParleyError::ConversationNotFound {
            id: ConversationId::from("nope"),
        };
        let fragment = StreamFragment::error(None, &err);
        assert!(fragment.is_terminal());
        let value = serde_json::to_value(&fragment).unwrap();
        assert_eq!(value["kind"], "conversation_not_found");
        assert!(value.get("conversation_id").is_none());
    }
}
