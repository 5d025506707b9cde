// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted generation backend for deterministic testing.
//!
//! `ScriptedBackend` implements `GenerationBackend` with queued behaviors for
//! each path. When a queue is empty, the fallback behavior for that path is
//! used.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use parley_core::{
    AdapterType, BackendId, GenerationBackend, HealthStatus, ParleyError, PluginAdapter,
    TextStream,
};
use tokio::sync::Mutex;

/// What one `generate_stream` call does.
#[derive(Debug, Clone)]
pub enum StreamBehavior {
    /// Yields the chunks, then ends.
    Chunks(Vec<String>),
    /// Yields the chunks with a pause before each one.
    Slow(Vec<String>, Duration),
    /// Opens a stream that ends without any item.
    Empty,
    /// Fails before returning a stream.
    FailToOpen(String),
    /// Yields the chunks, then an error item.
    FailAfter(Vec<String>, String),
    /// Opens a stream that never yields.
    Hang,
}

/// What one `generate` call does.
#[derive(Debug, Clone)]
pub enum GenerateBehavior {
    Text(String),
    /// Returns an empty string.
    Empty,
    Fail(String),
    /// Never returns.
    Hang,
}

/// A backend that replays scripted behaviors and counts calls.
pub struct ScriptedBackend {
    id: BackendId,
    streams: Mutex<VecDeque<StreamBehavior>>,
    generates: Mutex<VecDeque<GenerateBehavior>>,
    stream_fallback: StreamBehavior,
    generate_fallback: GenerateBehavior,
    stream_calls: AtomicUsize,
    generate_calls: AtomicUsize,
}

impl ScriptedBackend {
    /// Backend whose every call fails.
    pub fn failing(id: &str) -> Self {
        Self {
            id: BackendId::from(id),
            streams: Mutex::new(VecDeque::new()),
            generates: Mutex::new(VecDeque::new()),
            stream_fallback: StreamBehavior::FailToOpen(format!("{id} is down")),
            generate_fallback: GenerateBehavior::Fail(format!("{id} is down")),
            stream_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
        }
    }

    /// Backend that answers `text` on both paths, streamed word by word.
    pub fn replying(id: &str, text: &str) -> Self {
        let chunks = text
            .split_inclusive(' ')
            .map(str::to_string)
            .collect::<Vec<_>>();
        Self {
            stream_fallback: StreamBehavior::Chunks(chunks),
            generate_fallback: GenerateBehavior::Text(text.to_string()),
            ..Self::failing(id)
        }
    }

    /// Replaces the behavior used once the stream queue is empty.
    pub fn otherwise_stream(mut self, behavior: StreamBehavior) -> Self {
        self.stream_fallback = behavior;
        self
    }

    /// Replaces the behavior used once the generate queue is empty.
    pub fn otherwise_generate(mut self, behavior: GenerateBehavior) -> Self {
        self.generate_fallback = behavior;
        self
    }

    /// Queues a behavior for the next `generate_stream` call.
    pub fn then_stream(mut self, behavior: StreamBehavior) -> Self {
        self.streams.get_mut().push_back(behavior);
        self
    }

    /// Queues a behavior for the next `generate` call.
    pub fn then_generate(mut self, behavior: GenerateBehavior) -> Self {
        self.generates.get_mut().push_back(behavior);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn id(&self) -> &BackendId {
        &self.id
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    /// Total calls on either path.
    pub fn calls(&self) -> usize {
        self.stream_calls() + self.generate_calls()
    }

    fn failure(&self, message: &str) -> ParleyError {
        ParleyError::backend(format!("{}: {message}", self.id))
    }
}

#[async_trait]
impl PluginAdapter for ScriptedBackend {
    fn name(&self) -> &str {
        self.id.as_str()
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Backend
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, _prompt: &str) -> Result<String, ParleyError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .generates
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.generate_fallback.clone());
        match behavior {
            GenerateBehavior::Text(text) => Ok(text),
            GenerateBehavior::Empty => Ok(String::new()),
            GenerateBehavior::Fail(message) => Err(self.failure(&message)),
            GenerateBehavior::Hang => futures::future::pending().await,
        }
    }

    async fn generate_stream(&self, _prompt: &str) -> Result<TextStream, ParleyError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .streams
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.stream_fallback.clone());
        let stream: TextStream = match behavior {
            StreamBehavior::Chunks(chunks) => Box::pin(stream::iter(ok_chunks(chunks))),
            StreamBehavior::Slow(chunks, delay) => {
                Box::pin(stream::iter(ok_chunks(chunks)).then(move |chunk| async move {
                    tokio::time::sleep(delay).await;
                    chunk
                }))
            }
            StreamBehavior::Empty => Box::pin(stream::empty::<Result<String, ParleyError>>()),
            StreamBehavior::FailToOpen(message) => return Err(self.failure(&message)),
            StreamBehavior::FailAfter(chunks, message) => {
                let failure = self.failure(&message);
                let tail = stream::once(async move { Err(failure) });
                Box::pin(stream::iter(ok_chunks(chunks)).chain(tail))
            }
            StreamBehavior::Hang => Box::pin(stream::pending::<Result<String, ParleyError>>()),
        };
        Ok(stream)
    }
}

fn ok_chunks(chunks: Vec<String>) -> Vec<Result<String, ParleyError>> {
    chunks.into_iter().map(Ok).collect()
}
