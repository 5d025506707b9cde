// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation checkpointing around one generation turn.
//!
//! The user message is durable before generation starts; the assistant
//! message, or a visible error marker, is written after generation ends.

use std::sync::Arc;

use parley_config::{CheckpointConfig, UnknownConversationPolicy};
use parley_core::{Conversation, ConversationId, ConversationStore, Message, ParleyError, UserId};
use tracing::{debug, info, warn};

/// Appended to a partial reply saved after the caller disconnected.
pub const INTERRUPTED_NOTICE: &str =
    "\n\n[Response interrupted: the client disconnected before generation finished.]";

/// Saves tried per checkpoint when other turns keep appending concurrently.
const MAX_SAVE_ATTEMPTS: usize = 3;

/// Lifecycle of one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    New,
    /// User message persisted.
    UserSaved,
    /// Generation in progress.
    Streaming,
    AssistantSaved,
    /// Error marker persisted in place of a reply.
    ErrorSaved,
    /// Partial reply persisted after the caller went away.
    Interrupted,
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnState::New => write!(f, "new"),
            TurnState::UserSaved => write!(f, "user_saved"),
            TurnState::Streaming => write!(f, "streaming"),
            TurnState::AssistantSaved => write!(f, "assistant_saved"),
            TurnState::ErrorSaved => write!(f, "error_saved"),
            TurnState::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// A turn in progress: the persisted conversation and where the turn stands.
#[derive(Debug, Clone)]
pub struct Turn {
    conversation_id: ConversationId,
    conversation: Conversation,
    state: TurnState,
    started_new: bool,
}

impl Turn {
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Conversation as of this turn's last save, including messages other
    /// turns appended before it.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// True if this turn opened a new conversation.
    pub fn started_new(&self) -> bool {
        self.started_new
    }

    pub fn mark_streaming(&mut self) {
        self.state = TurnState::Streaming;
    }
}

/// Persists the two halves of a turn through a [`ConversationStore`].
#[derive(Clone)]
pub struct Checkpointer {
    store: Arc<dyn ConversationStore>,
    config: CheckpointConfig,
}

impl Checkpointer {
    pub fn new(store: Arc<dyn ConversationStore>, config: CheckpointConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Appends the user message and persists it.
    ///
    /// A conversation id that does not exist, or belongs to another user, is
    /// handled by the `unknown_conversation` policy. Store failures here are
    /// terminal: no generation should start.
    pub async fn begin_turn(
        &self,
        user_id: &UserId,
        conversation_id: Option<&ConversationId>,
        text: &str,
    ) -> Result<Turn, ParleyError> {
        let message = Message::user(text)?;

        let (conversation, started_new) = match conversation_id {
            None => (Conversation::new(user_id.clone()), true),
            Some(id) => match self.store.find_by_id(id).await? {
                Some(existing) if existing.user_id() == user_id => (existing, false),
                _ => match self.config.unknown_conversation {
                    UnknownConversationPolicy::Reject => {
                        warn!(conversation_id = %id, user_id = %user_id, "conversation not found");
                        return Err(ParleyError::ConversationNotFound { id: id.clone() });
                    }
                    UnknownConversationPolicy::StartNew => {
                        info!(
                            requested = %id,
                            user_id = %user_id,
                            "conversation not found, starting a new one"
                        );
                        (Conversation::new(user_id.clone()), true)
                    }
                },
            },
        };

        let saved = self.save_appended(conversation, message).await?;
        let conversation_id = saved.id().cloned().ok_or_else(|| {
            ParleyError::Internal("store returned a conversation without an id".into())
        })?;
        debug!(
            conversation_id = %conversation_id,
            messages = saved.messages().len(),
            "user turn saved"
        );

        Ok(Turn {
            conversation_id,
            conversation: saved,
            state: TurnState::UserSaved,
            started_new,
        })
    }

    /// Persists the assistant reply.
    pub async fn complete(&self, turn: &mut Turn, text: &str) -> Result<(), ParleyError> {
        self.append(turn, Message::assistant(text)?).await?;
        turn.state = TurnState::AssistantSaved;
        debug!(conversation_id = %turn.conversation_id, "assistant turn saved");
        Ok(())
    }

    /// Persists the error marker for a failed generation.
    ///
    /// Never fails: a store error here is logged so that the caller keeps
    /// reporting the generation error.
    pub async fn fail(&self, turn: &mut Turn, error: &ParleyError) {
        let content = format!("{} ({})", self.config.error_marker, error.kind());
        let result = match Message::assistant(content) {
            Ok(message) => self.append(turn, message).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                turn.state = TurnState::ErrorSaved;
                debug!(conversation_id = %turn.conversation_id, "error marker saved");
            }
            Err(store_err) => warn!(
                conversation_id = %turn.conversation_id,
                error = %store_err,
                generation_error = %error,
                "failed to checkpoint error marker"
            ),
        }
    }

    /// Best-effort save of a partial reply after the caller disconnected.
    pub async fn interrupt(&self, turn: &mut Turn, partial: &str) {
        if !self.config.persist_partial_on_cancel {
            debug!(conversation_id = %turn.conversation_id, "partial persistence disabled");
            return;
        }
        if partial.trim().is_empty() {
            debug!(conversation_id = %turn.conversation_id, "nothing generated before disconnect");
            return;
        }
        let result = match Message::assistant(format!("{partial}{INTERRUPTED_NOTICE}")) {
            Ok(message) => self.append(turn, message).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                turn.state = TurnState::Interrupted;
                info!(
                    conversation_id = %turn.conversation_id,
                    chars = partial.chars().count(),
                    "partial reply saved after disconnect"
                );
            }
            Err(e) => warn!(
                conversation_id = %turn.conversation_id,
                error = %e,
                "failed to checkpoint partial reply"
            ),
        }
    }

    /// Saves a copy with `message` appended; the turn only advances on success.
    async fn append(&self, turn: &mut Turn, message: Message) -> Result<(), ParleyError> {
        turn.conversation = self
            .save_appended(turn.conversation.clone(), message)
            .await?;
        Ok(())
    }

    /// Saves `base` plus `message`. If another turn appended to the same
    /// conversation since `base` was loaded, the message goes onto the stored
    /// state instead.
    async fn save_appended(
        &self,
        mut base: Conversation,
        message: Message,
    ) -> Result<Conversation, ParleyError> {
        let mut attempt = 1;
        loop {
            let mut next = base.clone();
            next.push(message.clone());
            match self.store.save(&next).await {
                Ok(saved) => return Ok(saved),
                Err(e) if e.is_stale_snapshot() && attempt < MAX_SAVE_ATTEMPTS => {
                    let Some(id) = base.id().cloned() else {
                        return Err(e);
                    };
                    debug!(
                        conversation_id = %id,
                        attempt,
                        "conversation changed concurrently, appending onto stored state"
                    );
                    base = self
                        .store
                        .find_by_id(&id)
                        .await?
                        .ok_or(ParleyError::ConversationNotFound { id })?;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl std::fmt::Debug for Checkpointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkpointer")
            .field("store", &self.store.name())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::Role;
    use parley_storage::{MemoryConversationStore, SqliteConversationStore};

    fn checkpointer(policy: UnknownConversationPolicy) -> Checkpointer {
        let config = CheckpointConfig {
            unknown_conversation: policy,
            ..CheckpointConfig::default()
        };
        Checkpointer::new(Arc::new(MemoryConversationStore::new()), config)
    }

    #[tokio::test]
    async fn begin_turn_persists_user_message() {
        let cp = checkpointer(UnknownConversationPolicy::Reject);
        let turn = cp.begin_turn(&UserId::from("u"), None, "Hello").await.unwrap();
        assert_eq!(turn.state(), TurnState::UserSaved);
        assert!(turn.started_new());

        let stored = cp
            .store()
            .find_by_id(turn.conversation_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.messages().len(), 1);
        assert_eq!(stored.messages()[0].role(), Role::User);
    }

    #[tokio::test]
    async fn blank_message_is_rejected_before_saving() {
        let cp = checkpointer(UnknownConversationPolicy::Reject);
        let err = cp.begin_turn(&UserId::from("u"), None, "  ").await.unwrap_err();
        assert!(matches!(err, ParleyError::InvalidMessage(_)));
        assert!(cp.store().find_by_user(&UserId::from("u")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_conversation_is_rejected() {
        let cp = checkpointer(UnknownConversationPolicy::Reject);
        let err = cp
            .begin_turn(&UserId::from("u"), Some(&ConversationId::from("missing")), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::ConversationNotFound { .. }));
    }

    #[tokio::test]
    async fn unknown_conversation_starts_new_when_configured() {
        let cp = checkpointer(UnknownConversationPolicy::StartNew);
        let missing = ConversationId::from("missing");
        let turn = cp
            .begin_turn(&UserId::from("u"), Some(&missing), "hi")
            .await
            .unwrap();
        assert!(turn.started_new());
        assert_ne!(turn.conversation_id(), &missing);
    }

    #[tokio::test]
    async fn other_users_conversation_is_not_found() {
        let cp = checkpointer(UnknownConversationPolicy::Reject);
        let alice = cp.begin_turn(&UserId::from("alice"), None, "mine").await.unwrap();
        let err = cp
            .begin_turn(&UserId::from("bob"), Some(alice.conversation_id()), "yours?")
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::ConversationNotFound { .. }));
    }

    #[tokio::test]
    async fn complete_then_continue() {
        let cp = checkpointer(UnknownConversationPolicy::Reject);
        let user = UserId::from("u");
        let mut turn = cp.begin_turn(&user, None, "Hello").await.unwrap();
        turn.mark_streaming();
        cp.complete(&mut turn, "Hi!").await.unwrap();
        assert_eq!(turn.state(), TurnState::AssistantSaved);

        let id = turn.conversation_id().clone();
        let next = cp.begin_turn(&user, Some(&id), "Follow up").await.unwrap();
        assert!(!next.started_new());
        assert_eq!(next.conversation().messages().len(), 3);
    }

    #[tokio::test]
    async fn fail_saves_error_marker() {
        let cp = checkpointer(UnknownConversationPolicy::Reject);
        let mut turn = cp.begin_turn(&UserId::from("u"), None, "Hello").await.unwrap();
        cp.fail(&mut turn, &ParleyError::EmptyStream).await;
        assert_eq!(turn.state(), TurnState::ErrorSaved);

        let last = turn.conversation().last_message().unwrap();
        assert_eq!(last.role(), Role::Assistant);
        assert!(last.content().starts_with(&CheckpointConfig::default().error_marker));
    }

    #[tokio::test]
    async fn interrupt_saves_partial_with_notice() {
        let cp = checkpointer(UnknownConversationPolicy::Reject);
        let mut turn = cp.begin_turn(&UserId::from("u"), None, "Hello").await.unwrap();
        cp.interrupt(&mut turn, "Partial ans").await;
        assert_eq!(turn.state(), TurnState::Interrupted);
        assert_eq!(
            turn.conversation().last_message().unwrap().content(),
            format!("Partial ans{INTERRUPTED_NOTICE}")
        );
    }

    #[tokio::test]
    async fn interrupt_skips_blank_partial() {
        let cp = checkpointer(UnknownConversationPolicy::Reject);
        let mut turn = cp.begin_turn(&UserId::from("u"), None, "Hello").await.unwrap();
        turn.mark_streaming();
        cp.interrupt(&mut turn, "  ").await;
        assert_eq!(turn.state(), TurnState::Streaming);
        assert_eq!(turn.conversation().messages().len(), 1);
    }

    /// Two turns on one conversation, each completing after the other began.
    async fn overlapping_turns_keep_every_message(store: Arc<dyn ConversationStore>) {
        let cp = Checkpointer::new(store, CheckpointConfig::default());
        let user = UserId::from("u");
        let mut first = cp.begin_turn(&user, None, "Hello").await.unwrap();
        cp.complete(&mut first, "Hi").await.unwrap();
        let id = first.conversation_id().clone();

        let mut tab_a = cp.begin_turn(&user, Some(&id), "from tab A").await.unwrap();
        let mut tab_b = cp.begin_turn(&user, Some(&id), "from tab B").await.unwrap();
        cp.complete(&mut tab_a, "reply A").await.unwrap();
        cp.complete(&mut tab_b, "reply B").await.unwrap();
        assert_eq!(tab_a.state(), TurnState::AssistantSaved);
        assert_eq!(tab_b.state(), TurnState::AssistantSaved);

        let stored = cp.store().find_by_id(&id).await.unwrap().unwrap();
        let contents: Vec<&str> = stored.messages().iter().map(|m| m.content()).collect();
        assert_eq!(
            contents,
            vec!["Hello", "Hi", "from tab A", "from tab B", "reply A", "reply B"]
        );
        assert_eq!(tab_b.conversation().messages().len(), 6);
    }

    #[tokio::test]
    async fn overlapping_turns_keep_every_message_in_memory() {
        overlapping_turns_keep_every_message(Arc::new(MemoryConversationStore::new())).await;
    }

    #[tokio::test]
    async fn overlapping_turns_keep_every_message_in_sqlite() {
        let store = SqliteConversationStore::in_memory().await.unwrap();
        overlapping_turns_keep_every_message(Arc::new(store)).await;
    }

    #[tokio::test]
    async fn error_marker_lands_after_a_concurrent_reply() {
        let cp = checkpointer(UnknownConversationPolicy::Reject);
        let user = UserId::from("u");
        let first = cp.begin_turn(&user, None, "Hello").await.unwrap();
        let id = first.conversation_id().clone();

        let mut failing = cp.begin_turn(&user, Some(&id), "one").await.unwrap();
        let mut answered = cp.begin_turn(&user, Some(&id), "two").await.unwrap();
        cp.complete(&mut answered, "answer two").await.unwrap();
        cp.fail(&mut failing, &ParleyError::EmptyStream).await;
        assert_eq!(failing.state(), TurnState::ErrorSaved);

        let stored = cp.store().find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.messages().len(), 5);
        assert_eq!(stored.messages()[3].content(), "answer two");
        assert!(stored.messages()[4]
            .content()
            .starts_with(&CheckpointConfig::default().error_marker));
    }
}
