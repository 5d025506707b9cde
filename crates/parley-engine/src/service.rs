// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Caller-facing chat operations.
//!
//! [`ChatService::submit`] returns the complete reply. [`ChatService::submit_stream`]
//! spawns one task per request that drives the orchestrator and forwards
//! [`StreamFragment`]s through a bounded channel, so a slow reader suspends
//! generation instead of growing a buffer.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use parley_config::ParleyConfig;
use parley_core::{
    BackendId, Conversation, ConversationId, ConversationStore, ParleyError, UserId,
};
use parley_resilience::{FallbackChain, ProviderStateTracker, build_fallback_chain};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::accumulator::TRUNCATION_NOTICE;
use crate::checkpoint::Checkpointer;
use crate::fragment::StreamFragment;
use crate::orchestrator::{
    ChunkSink, OrchestratorSettings, StreamOutcome, StreamingOrchestrator,
};
use crate::registry::BackendRegistry;

/// One user message to answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub user_id: UserId,
    /// Conversation to continue; `None` starts a new one.
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    pub message: String,
    /// Overrides the configured primary backend.
    #[serde(default)]
    pub backend: Option<BackendId>,
}

impl ChatRequest {
    pub fn new(user_id: impl Into<UserId>, message: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            conversation_id: None,
            message: message.into(),
            backend: None,
        }
    }

    pub fn in_conversation(mut self, id: impl Into<ConversationId>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn on_backend(mut self, id: impl Into<BackendId>) -> Self {
        self.backend = Some(id.into());
        self
    }
}

/// Complete reply of the non-streaming path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub conversation_id: ConversationId,
    /// Persisted reply text, including the truncation notice if any.
    pub text: String,
    pub backend: BackendId,
    pub truncated: bool,
}

/// Fragments of one streamed reply. Ends after a terminal fragment.
///
/// Dropping it cancels generation.
#[derive(Debug)]
pub struct FragmentStream {
    rx: mpsc::Receiver<StreamFragment>,
}

impl FragmentStream {
    /// Receives the next fragment, `None` once the stream is finished.
    pub async fn recv(&mut self) -> Option<StreamFragment> {
        self.rx.recv().await
    }
}

impl Stream for FragmentStream {
    type Item = StreamFragment;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Forwards orchestrator chunks as `Text`/`Restart` fragments.
struct ChannelSink {
    tx: mpsc::Sender<StreamFragment>,
}

#[async_trait]
impl ChunkSink for ChannelSink {
    async fn send(&mut self, chunk: String) -> bool {
        self.tx.send(StreamFragment::Text { text: chunk }).await.is_ok()
    }

    async fn restart(&mut self, backend: &BackendId) -> bool {
        self.tx
            .send(StreamFragment::Restart {
                backend: backend.clone(),
            })
            .await
            .is_ok()
    }

    async fn closed(&self) {
        self.tx.closed().await;
    }
}

struct Inner {
    config: Arc<ParleyConfig>,
    orchestrator: StreamingOrchestrator,
    checkpointer: Checkpointer,
}

/// Entry point for chat requests. Cheap to clone.
#[derive(Clone)]
pub struct ChatService {
    inner: Arc<Inner>,
}

impl ChatService {
    pub fn new(
        config: Arc<ParleyConfig>,
        backends: BackendRegistry,
        store: Arc<dyn ConversationStore>,
        tracker: Arc<ProviderStateTracker>,
    ) -> Self {
        let settings = OrchestratorSettings::from(&config.generation);
        let orchestrator = StreamingOrchestrator::new(backends, tracker, settings);
        let checkpointer = Checkpointer::new(store, config.checkpoint.clone());
        Self {
            inner: Arc::new(Inner {
                config,
                orchestrator,
                checkpointer,
            }),
        }
    }

    pub fn config(&self) -> &ParleyConfig {
        &self.inner.config
    }

    pub fn tracker(&self) -> &Arc<ProviderStateTracker> {
        self.inner.orchestrator.tracker()
    }

    pub fn backends(&self) -> &BackendRegistry {
        self.inner.orchestrator.backends()
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        self.inner.checkpointer.store()
    }

    /// Loads a conversation if it belongs to `user_id`.
    pub async fn conversation(
        &self,
        user_id: &UserId,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, ParleyError> {
        Ok(self
            .store()
            .find_by_id(id)
            .await?
            .filter(|c| c.user_id() == user_id))
    }

    /// Lists a user's conversations, most recent first.
    pub async fn conversations(&self, user_id: &UserId) -> Result<Vec<Conversation>, ParleyError> {
        self.store().find_by_user(user_id).await
    }

    /// Fallback chain for a request, primary first.
    pub fn chain_for(&self, backend: Option<&BackendId>) -> FallbackChain {
        let config = &self.inner.config;
        let primary = backend
            .cloned()
            .unwrap_or_else(|| BackendId::from(config.generation.primary.as_str()));
        let fallbacks = config.fallbacks_for(&primary);
        let chain = build_fallback_chain(
            &primary,
            &fallbacks,
            config.generation.cooldown(),
            self.tracker(),
        );
        debug!(chain = ?chain.candidates(), "fallback chain built");
        chain
    }

    /// Answers one message and returns the complete reply.
    pub async fn submit(&self, request: ChatRequest) -> Result<ChatReply, ParleyError> {
        let checkpointer = &self.inner.checkpointer;
        let mut turn = checkpointer
            .begin_turn(
                &request.user_id,
                request.conversation_id.as_ref(),
                &request.message,
            )
            .await?;
        turn.mark_streaming();

        let chain = self.chain_for(request.backend.as_ref());
        match self.inner.orchestrator.generate(chain, &request.message).await {
            Ok(session) => {
                let text = session.final_text();
                checkpointer.complete(&mut turn, &text).await?;
                let backend = session.backend().cloned().ok_or_else(|| {
                    ParleyError::Internal("successful session without a backend".into())
                })?;
                info!(
                    conversation_id = %turn.conversation_id(),
                    backend = %backend,
                    truncated = session.is_truncated(),
                    "reply completed"
                );
                Ok(ChatReply {
                    conversation_id: turn.conversation_id().clone(),
                    text,
                    backend,
                    truncated: session.is_truncated(),
                })
            }
            Err(e) => {
                checkpointer.fail(&mut turn, &e).await;
                Err(e)
            }
        }
    }

    /// Answers one message incrementally.
    ///
    /// Must be called within a tokio runtime.
    pub fn submit_stream(&self, request: ChatRequest) -> FragmentStream {
        let capacity = self.inner.config.generation.fragment_buffer.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let service = self.clone();
        tokio::spawn(async move {
            service.drive_stream(request, tx).await;
        });
        FragmentStream { rx }
    }

    async fn drive_stream(self, request: ChatRequest, tx: mpsc::Sender<StreamFragment>) {
        let checkpointer = &self.inner.checkpointer;
        let mut turn = match checkpointer
            .begin_turn(
                &request.user_id,
                request.conversation_id.as_ref(),
                &request.message,
            )
            .await
        {
            Ok(turn) => turn,
            Err(e) => {
                warn!(user_id = %request.user_id, error = %e, "could not begin turn");
                let _ = tx.send(StreamFragment::error(None, &e)).await;
                return;
            }
        };
        let conversation_id = turn.conversation_id().clone();

        let started = StreamFragment::Started {
            conversation_id: conversation_id.clone(),
        };
        if tx.send(started).await.is_err() {
            debug!(conversation_id = %conversation_id, "caller went away before generation");
            return;
        }
        turn.mark_streaming();

        let chain = self.chain_for(request.backend.as_ref());
        let mut sink = ChannelSink { tx };
        let outcome = self
            .inner
            .orchestrator
            .stream(chain, &request.message, &mut sink)
            .await;

        match outcome {
            Ok(StreamOutcome::Succeeded(session)) => {
                if session.is_truncated() {
                    sink.send(TRUNCATION_NOTICE.to_string()).await;
                }
                let Some(backend) = session.backend().cloned() else {
                    let e = ParleyError::Internal("successful session without a backend".into());
                    checkpointer.fail(&mut turn, &e).await;
                    let _ = sink.tx.send(StreamFragment::error(Some(conversation_id), &e)).await;
                    return;
                };
                let terminal = match checkpointer.complete(&mut turn, &session.final_text()).await {
                    Ok(()) => {
                        info!(
                            conversation_id = %conversation_id,
                            backend = %backend,
                            chunks = session.chunks(),
                            "streamed reply completed"
                        );
                        StreamFragment::Done {
                            conversation_id,
                            backend,
                            truncated: session.is_truncated(),
                        }
                    }
                    Err(e) => {
                        warn!(conversation_id = %conversation_id, error = %e, "failed to save reply");
                        StreamFragment::error(Some(conversation_id), &e)
                    }
                };
                let _ = sink.tx.send(terminal).await;
            }
            Ok(StreamOutcome::Cancelled(session)) => {
                checkpointer.interrupt(&mut turn, session.text()).await;
            }
            Err(e) => {
                checkpointer.fail(&mut turn, &e).await;
                let _ = sink
                    .tx
                    .send(StreamFragment::error(Some(conversation_id), &e))
                    .await;
            }
        }
    }
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("backends", self.backends())
            .field("checkpointer", &self.inner.checkpointer)
            .finish()
    }
}
