// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a [`ChatService`] over scripted backends, a shared
//! failure tracker, and either an in-memory, flaky, or temp-file SQLite store.

use std::sync::Arc;

use futures::StreamExt;
use parley_config::{
    BackendConfig, BackendKind, ParleyConfig, StorageBackend, UnknownConversationPolicy,
};
use parley_core::{ConversationStore, ParleyError};
use parley_engine::{BackendRegistry, ChatReply, ChatRequest, ChatService, StreamFragment};
use parley_resilience::ProviderStateTracker;
use parley_storage::{MemoryConversationStore, SqliteConversationStore};

use crate::scripted_backend::ScriptedBackend;

enum StoreChoice {
    Memory,
    Sqlite,
    Custom(Arc<dyn ConversationStore>),
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    backends: Vec<Arc<ScriptedBackend>>,
    config: ParleyConfig,
    store: StoreChoice,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = ParleyConfig::default();
        config.backends.clear();
        config.generation.fallbacks.clear();
        config.generation.simulated_chunk_delay_ms = 0;
        config.storage.backend = StorageBackend::Memory;
        Self {
            backends: Vec::new(),
            config,
            store: StoreChoice::Memory,
        }
    }

    /// Registers a backend. The first one added becomes the primary.
    pub fn with_backend(mut self, backend: Arc<ScriptedBackend>) -> Self {
        if self.backends.is_empty() {
            self.config.generation.primary = backend.id().to_string();
        }
        self.config.backends.push(BackendConfig {
            id: backend.id().to_string(),
            kind: BackendKind::Echo,
            model: None,
            api_key: None,
            base_url: None,
            api_version: None,
            max_tokens: 500,
            temperature: 0.7,
            system_prompt: None,
        });
        self.backends.push(backend);
        self
    }

    pub fn with_max_response_chars(mut self, max: usize) -> Self {
        self.config.generation.max_response_chars = max;
        self
    }

    pub fn with_simulated_chunk_chars(mut self, chars: usize) -> Self {
        self.config.generation.simulated_chunk_chars = chars;
        self
    }

    pub fn with_unknown_conversation(mut self, policy: UnknownConversationPolicy) -> Self {
        self.config.checkpoint.unknown_conversation = policy;
        self
    }

    pub fn with_fallback_disabled(mut self) -> Self {
        self.config.generation.fallback_enabled = false;
        self
    }

    /// Persists to a SQLite file in a temp directory.
    pub fn with_sqlite(mut self) -> Self {
        self.store = StoreChoice::Sqlite;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = StoreChoice::Custom(store);
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(mut self) -> Result<TestHarness, ParleyError> {
        let mut temp_dir = None;
        let store: Arc<dyn ConversationStore> = match self.store {
            StoreChoice::Memory => Arc::new(MemoryConversationStore::new()),
            StoreChoice::Custom(store) => store,
            StoreChoice::Sqlite => {
                let dir = tempfile::TempDir::new().map_err(ParleyError::store)?;
                self.config.storage.backend = StorageBackend::Sqlite;
                self.config.storage.database_path =
                    dir.path().join("parley.db").to_string_lossy().into_owned();
                let store = SqliteConversationStore::open(&self.config.storage).await?;
                temp_dir = Some(dir);
                Arc::new(store)
            }
        };

        let mut registry = BackendRegistry::new();
        for backend in &self.backends {
            registry.register(backend.clone());
        }
        let tracker = Arc::new(ProviderStateTracker::new());
        let config = Arc::new(self.config);
        let service = ChatService::new(config, registry, store.clone(), tracker.clone());

        Ok(TestHarness {
            service,
            tracker,
            store,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment around a [`ChatService`].
pub struct TestHarness {
    pub service: ChatService,
    pub tracker: Arc<ProviderStateTracker>,
    pub store: Arc<dyn ConversationStore>,
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Non-streaming request.
    pub async fn send(&self, request: ChatRequest) -> Result<ChatReply, ParleyError> {
        self.service.submit(request).await
    }

    /// Streaming request, collected until the stream ends.
    pub async fn stream(&self, request: ChatRequest) -> Vec<StreamFragment> {
        self.service.submit_stream(request).collect().await
    }
}

/// Concatenated `Text` fragments after the last `Restart`.
pub fn streamed_text(fragments: &[StreamFragment]) -> String {
    let start = fragments
        .iter()
        .rposition(|f| matches!(f, StreamFragment::Restart { .. }))
        .map_or(0, |i| i + 1);
    fragments[start..]
        .iter()
        .filter_map(|f| match f {
            StreamFragment::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}
