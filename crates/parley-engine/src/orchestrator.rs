// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming orchestrator: drives one request across the fallback chain.
//!
//! For each candidate the orchestrator first tries the backend's native
//! stream and, if that fails, falls back to a single-shot call whose result is
//! re-chunked locally ("simulated streaming"). States:
//!
//! Selecting -> StreamingNative -> StreamingSimulated -> Succeeded | Exhausted
//!
//! Every chunk passes through the [`ResponseAccumulator`] before it reaches the
//! sink, and only one chunk is in flight at a time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parley_config::GenerationConfig;
use parley_core::{BackendFailure, BackendId, GenerationBackend, ParleyError};
use parley_resilience::{FallbackChain, ProviderStateTracker};
use tracing::{debug, error, info, warn};

use crate::accumulator::ResponseAccumulator;
use crate::registry::BackendRegistry;

/// Orchestrator states, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Picking the next candidate from the chain.
    Selecting,
    /// Pulling the backend's native stream.
    StreamingNative,
    /// Re-chunking a single-shot reply.
    StreamingSimulated,
    Succeeded,
    /// Chain exhausted without a reply.
    Exhausted,
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestratorState::Selecting => write!(f, "selecting"),
            OrchestratorState::StreamingNative => write!(f, "streaming_native"),
            OrchestratorState::StreamingSimulated => write!(f, "streaming_simulated"),
            OrchestratorState::Succeeded => write!(f, "succeeded"),
            OrchestratorState::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Receiver of emitted chunks.
///
/// `send` and `restart` return false once the receiving side is gone.
#[async_trait]
pub trait ChunkSink: Send + Sync {
    async fn send(&mut self, chunk: String) -> bool;

    /// Tells the receiver to discard what it got so far.
    async fn restart(&mut self, backend: &BackendId) -> bool;

    /// Resolves when the receiving side goes away.
    async fn closed(&self);
}

/// Per-request progress: accumulated text, emitted chunk count, and the
/// backend that produced the reply.
#[derive(Debug, Clone)]
pub struct StreamSession {
    accumulator: ResponseAccumulator,
    chunks: usize,
    backend: Option<BackendId>,
}

impl StreamSession {
    pub fn new(max_chars: usize) -> Self {
        Self {
            accumulator: ResponseAccumulator::new(max_chars),
            chunks: 0,
            backend: None,
        }
    }

    /// Accumulated text without notices.
    pub fn text(&self) -> &str {
        self.accumulator.text()
    }

    /// Text to persist, with the truncation notice when applicable.
    pub fn final_text(&self) -> String {
        self.accumulator.final_text()
    }

    pub fn is_truncated(&self) -> bool {
        self.accumulator.is_truncated()
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// The backend that succeeded, if any.
    pub fn backend(&self) -> Option<&BackendId> {
        self.backend.as_ref()
    }

    fn reset(&mut self) {
        self.accumulator.reset();
        self.chunks = 0;
    }
}

/// How a streaming run ended without exhausting the chain.
#[derive(Debug)]
pub enum StreamOutcome {
    Succeeded(StreamSession),
    /// The sink went away; carries whatever was emitted before that.
    Cancelled(StreamSession),
}

/// Timing and size limits for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_response_chars: usize,
    pub simulated_chunk_chars: usize,
    pub simulated_chunk_delay: Duration,
    pub stream_idle_timeout: Duration,
    pub request_timeout: Duration,
}

impl From<&GenerationConfig> for OrchestratorSettings {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_response_chars: config.max_response_chars,
            simulated_chunk_chars: config.simulated_chunk_chars,
            simulated_chunk_delay: config.simulated_chunk_delay(),
            stream_idle_timeout: config.stream_idle_timeout(),
            request_timeout: config.request_timeout(),
        }
    }
}

enum Attempt {
    Done,
    Failed(ParleyError),
    Cancelled,
}

/// Walks a [`FallbackChain`] until one backend produces a reply.
pub struct StreamingOrchestrator {
    backends: BackendRegistry,
    tracker: Arc<ProviderStateTracker>,
    settings: OrchestratorSettings,
}

impl StreamingOrchestrator {
    pub fn new(
        backends: BackendRegistry,
        tracker: Arc<ProviderStateTracker>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            backends,
            tracker,
            settings,
        }
    }

    pub fn tracker(&self) -> &Arc<ProviderStateTracker> {
        &self.tracker
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Streams a reply for `prompt` into `sink`.
    ///
    /// Returns [`ParleyError::AllBackendsFailed`] when every candidate failed
    /// on both paths. If a native stream dies after emitting text, the sink
    /// gets a `restart` before the same backend is retried single-shot.
    pub async fn stream<S>(
        &self,
        chain: FallbackChain,
        prompt: &str,
        sink: &mut S,
    ) -> Result<StreamOutcome, ParleyError>
    where
        S: ChunkSink + ?Sized,
    {
        let mut session = StreamSession::new(self.settings.max_response_chars);
        let mut attempts = Vec::new();

        for id in chain {
            enter(OrchestratorState::Selecting, Some(&id));
            let Some(backend) = self.backends.get(&id) else {
                warn!(backend = %id, "backend in chain is not registered, skipping");
                attempts.push(BackendFailure {
                    errors: vec![ParleyError::BackendNotRegistered(id.clone())],
                    backend: id,
                });
                continue;
            };
            let mut errors = Vec::new();

            enter(OrchestratorState::StreamingNative, Some(&id));
            match self
                .native(backend.as_ref(), prompt, &mut session, sink)
                .await
            {
                Attempt::Done => return Ok(StreamOutcome::Succeeded(self.succeed(id, session))),
                Attempt::Cancelled => return Ok(self.cancelled(&id, session)),
                Attempt::Failed(e) => {
                    warn!(
                        backend = %id,
                        error = %e,
                        chunks = session.chunks(),
                        "native stream failed, falling back to simulated streaming"
                    );
                    self.tracker.mark_failed(&id);
                    errors.push(e);
                    if session.chunks() > 0 {
                        session.reset();
                        if !sink.restart(&id).await {
                            return Ok(self.cancelled(&id, session));
                        }
                    }
                }
            }

            enter(OrchestratorState::StreamingSimulated, Some(&id));
            match self
                .simulated(backend.as_ref(), prompt, &mut session, sink)
                .await
            {
                Attempt::Done => return Ok(StreamOutcome::Succeeded(self.succeed(id, session))),
                Attempt::Cancelled => return Ok(self.cancelled(&id, session)),
                Attempt::Failed(e) => {
                    warn!(backend = %id, error = %e, "simulated streaming failed, trying next backend");
                    self.tracker.mark_failed(&id);
                    errors.push(e);
                }
            }

            attempts.push(BackendFailure {
                backend: id,
                errors,
            });
        }

        Err(exhausted(attempts))
    }

    /// Single-shot variant: walks the chain with `generate` only.
    ///
    /// The reply is bounded by the same accumulator limit as the streaming path.
    pub async fn generate(
        &self,
        chain: FallbackChain,
        prompt: &str,
    ) -> Result<StreamSession, ParleyError> {
        let mut attempts = Vec::new();

        for id in chain {
            enter(OrchestratorState::Selecting, Some(&id));
            let Some(backend) = self.backends.get(&id) else {
                warn!(backend = %id, "backend in chain is not registered, skipping");
                attempts.push(BackendFailure {
                    errors: vec![ParleyError::BackendNotRegistered(id.clone())],
                    backend: id,
                });
                continue;
            };

            match self.single_shot(backend.as_ref(), prompt).await {
                Ok(text) => {
                    let mut session = StreamSession::new(self.settings.max_response_chars);
                    let (emitted, _) = session.accumulator.append(&text);
                    if !emitted.is_empty() {
                        session.chunks = 1;
                    }
                    return Ok(self.succeed(id, session));
                }
                Err(e) => {
                    warn!(backend = %id, error = %e, "generation failed, trying next backend");
                    self.tracker.mark_failed(&id);
                    attempts.push(BackendFailure {
                        backend: id,
                        errors: vec![e],
                    });
                }
            }
        }

        Err(exhausted(attempts))
    }

    async fn native<S>(
        &self,
        backend: &dyn GenerationBackend,
        prompt: &str,
        session: &mut StreamSession,
        sink: &mut S,
    ) -> Attempt
    where
        S: ChunkSink + ?Sized,
    {
        let opened = tokio::select! {
            biased;
            () = sink.closed() => return Attempt::Cancelled,
            opened = tokio::time::timeout(self.settings.request_timeout, backend.generate_stream(prompt)) => opened,
        };
        let mut stream = match opened {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Attempt::Failed(e),
            Err(_) => {
                return Attempt::Failed(ParleyError::Timeout {
                    duration: self.settings.request_timeout,
                });
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                () = sink.closed() => return Attempt::Cancelled,
                next = tokio::time::timeout(self.settings.stream_idle_timeout, stream.next()) => next,
            };
            let chunk = match next {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(e))) => return Attempt::Failed(e),
                Ok(None) => break,
                Err(_) => {
                    return Attempt::Failed(ParleyError::Timeout {
                        duration: self.settings.stream_idle_timeout,
                    });
                }
            };
            if chunk.is_empty() {
                continue;
            }
            match emit(session, sink, &chunk).await {
                Some(false) => {}
                Some(true) => {
                    debug!(chunks = session.chunks(), "response limit reached, stopping stream");
                    break;
                }
                None => return Attempt::Cancelled,
            }
        }

        if session.chunks() == 0 || session.accumulator.is_blank() {
            return Attempt::Failed(ParleyError::EmptyStream);
        }
        Attempt::Done
    }

    async fn simulated<S>(
        &self,
        backend: &dyn GenerationBackend,
        prompt: &str,
        session: &mut StreamSession,
        sink: &mut S,
    ) -> Attempt
    where
        S: ChunkSink + ?Sized,
    {
        let text = tokio::select! {
            biased;
            () = sink.closed() => return Attempt::Cancelled,
            text = self.single_shot(backend, prompt) => text,
        };
        let text = match text {
            Ok(text) => text,
            Err(e) => return Attempt::Failed(e),
        };

        for (i, piece) in split_chars(&text, self.settings.simulated_chunk_chars)
            .into_iter()
            .enumerate()
        {
            if i > 0 && !self.settings.simulated_chunk_delay.is_zero() {
                tokio::select! {
                    biased;
                    () = sink.closed() => return Attempt::Cancelled,
                    () = tokio::time::sleep(self.settings.simulated_chunk_delay) => {}
                }
            }
            match emit(session, sink, piece).await {
                Some(false) => {}
                Some(true) => break,
                None => return Attempt::Cancelled,
            }
        }
        Attempt::Done
    }

    /// One `generate` call with the request timeout; blank replies are failures.
    async fn single_shot(
        &self,
        backend: &dyn GenerationBackend,
        prompt: &str,
    ) -> Result<String, ParleyError> {
        let text = tokio::time::timeout(self.settings.request_timeout, backend.generate(prompt))
            .await
            .map_err(|_| ParleyError::Timeout {
                duration: self.settings.request_timeout,
            })??;
        if text.trim().is_empty() {
            return Err(ParleyError::EmptyStream);
        }
        Ok(text)
    }

    fn succeed(&self, id: BackendId, mut session: StreamSession) -> StreamSession {
        self.tracker.mark_succeeded(&id);
        enter(OrchestratorState::Succeeded, Some(&id));
        info!(
            backend = %id,
            chunks = session.chunks(),
            truncated = session.is_truncated(),
            "generation succeeded"
        );
        session.backend = Some(id);
        session
    }

    fn cancelled(&self, id: &BackendId, session: StreamSession) -> StreamOutcome {
        info!(backend = %id, chunks = session.chunks(), "caller went away, stopping generation");
        StreamOutcome::Cancelled(session)
    }
}

/// Passes one chunk through the accumulator and on to the sink.
///
/// Returns the truncation flag, or `None` if the sink is gone.
async fn emit<S>(session: &mut StreamSession, sink: &mut S, chunk: &str) -> Option<bool>
where
    S: ChunkSink + ?Sized,
{
    let (piece, truncated) = session.accumulator.append(chunk);
    if !piece.is_empty() {
        if !sink.send(piece).await {
            return None;
        }
        session.chunks += 1;
    }
    Some(truncated)
}

fn enter(state: OrchestratorState, backend: Option<&BackendId>) {
    debug!(state = %state, backend = ?backend.map(BackendId::as_str), "orchestrator state");
}

fn exhausted(attempts: Vec<BackendFailure>) -> ParleyError {
    enter(OrchestratorState::Exhausted, None);
    let err = ParleyError::AllBackendsFailed { attempts };
    error!(error = %err, "all backends failed");
    err
}

/// Splits `text` into pieces of at most `size` chars (at least one char each).
pub fn split_chars(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut pieces = Vec::new();
    let mut start = 0;
    for (count, (idx, _)) in text.char_indices().enumerate() {
        if count > 0 && count % size == 0 {
            pieces.push(&text[start..idx]);
            start = idx;
        }
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}
