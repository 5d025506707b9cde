// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parley generation orchestrator.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use parley_core::BackendId;
use serde::{Deserialize, Serialize};

/// Top-level Parley configuration.
///
/// All sections are optional and default to a single local `echo` backend
/// backed by SQLite storage.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Fallback, cooldown, streaming, and response bounds.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Configured generation backends, in declaration order.
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendConfig>,

    /// Conversation store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Turn checkpointing policy.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

impl Default for ParleyConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            generation: GenerationConfig::default(),
            backends: default_backends(),
            storage: StorageConfig::default(),
            checkpoint: CheckpointConfig::default(),
        }
    }
}

impl ParleyConfig {
    /// Looks up a backend entry by id.
    pub fn backend(&self, id: &str) -> Option<&BackendConfig> {
        self.backends.iter().find(|b| b.id == id)
    }

    /// Ordered fallback candidates for `primary`, before cooldown filtering.
    ///
    /// Empty when fallback is disabled. When no explicit list is configured and
    /// `auto_fallback` is set, every other backend is used in declaration order.
    pub fn fallbacks_for(&self, primary: &BackendId) -> Vec<BackendId> {
        if !self.generation.fallback_enabled {
            return Vec::new();
        }
        if !self.generation.fallbacks.is_empty() {
            return self
                .generation
                .fallbacks
                .iter()
                .map(|id| BackendId::from(id.as_str()))
                .collect();
        }
        if self.generation.auto_fallback {
            return self
                .backends
                .iter()
                .filter(|b| b.id != primary.as_str())
                .map(|b| BackendId::from(b.id.as_str()))
                .collect();
        }
        Vec::new()
    }
}

fn default_backends() -> Vec<BackendConfig> {
    vec![BackendConfig {
        id: "echo".to_string(),
        kind: BackendKind::Echo,
        model: None,
        api_key: None,
        base_url: None,
        api_version: None,
        max_tokens: default_max_tokens(),
        temperature: default_temperature(),
        system_prompt: None,
    }]
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name used in logs and the shell prompt.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "parley".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Generation policy: chain construction, cooldown, streaming, and bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Backend id tried first when a request does not name one.
    #[serde(default = "default_primary")]
    pub primary: String,

    /// Explicit fallback order. Empty means "derive from `auto_fallback`".
    #[serde(default)]
    pub fallbacks: Vec<String>,

    /// When false, every request uses its primary backend only.
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,

    /// Use every other configured backend as fallback when `fallbacks` is empty.
    #[serde(default = "default_true")]
    pub auto_fallback: bool,

    /// Seconds a failed backend is skipped by new chains.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Maximum characters of generated text kept per response.
    #[serde(default = "default_max_response_chars")]
    pub max_response_chars: usize,

    /// Characters per chunk when simulating a stream from a single-shot response.
    #[serde(default = "default_simulated_chunk_chars")]
    pub simulated_chunk_chars: usize,

    /// Pause between simulated chunks, in milliseconds.
    #[serde(default = "default_simulated_chunk_delay_ms")]
    pub simulated_chunk_delay_ms: u64,

    /// Longest wait for the next native stream chunk before the stream is abandoned.
    #[serde(default = "default_stream_idle_timeout_secs")]
    pub stream_idle_timeout_secs: u64,

    /// Upper bound on one single-shot backend call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Capacity of the per-request fragment channel towards the caller.
    #[serde(default = "default_fragment_buffer")]
    pub fragment_buffer: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            fallbacks: Vec::new(),
            fallback_enabled: true,
            auto_fallback: true,
            cooldown_secs: default_cooldown_secs(),
            max_response_chars: default_max_response_chars(),
            simulated_chunk_chars: default_simulated_chunk_chars(),
            simulated_chunk_delay_ms: default_simulated_chunk_delay_ms(),
            stream_idle_timeout_secs: default_stream_idle_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            fragment_buffer: default_fragment_buffer(),
        }
    }
}

impl GenerationConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn simulated_chunk_delay(&self) -> Duration {
        Duration::from_millis(self.simulated_chunk_delay_ms)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_primary() -> String {
    "echo".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_max_response_chars() -> usize {
    8000
}

fn default_simulated_chunk_chars() -> usize {
    24
}

fn default_simulated_chunk_delay_ms() -> u64 {
    15
}

fn default_stream_idle_timeout_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_fragment_buffer() -> usize {
    1
}

/// Which adapter implementation serves a backend entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Anthropic Messages API.
    Anthropic,
    /// OpenAI-compatible chat completions API.
    Openai,
    /// Local backend that echoes the prompt; needs no credentials.
    Echo,
}

/// One `[[backends]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Identifier used in `generation.primary`, fallbacks, and request overrides.
    pub id: String,

    pub kind: BackendKind,

    /// Vendor model name. Required for remote kinds.
    #[serde(default)]
    pub model: Option<String>,

    /// API key. `None` falls back to the vendor's standard environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Override of the vendor base URL (proxies, compatible servers).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Vendor API version header, where applicable.
    #[serde(default)]
    pub api_version: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Optional system prompt sent with every request.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.7
}

/// Conversation store implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    /// Process-local store; contents are lost on exit.
    Memory,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,

    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Sqlite
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("parley").join("parley.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("parley.db"))
        .to_string_lossy()
        .into_owned()
}

/// What to do when a request names a conversation that cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownConversationPolicy {
    /// Fail with a conversation-not-found error (streaming and non-streaming alike).
    Reject,
    /// Start a fresh conversation and return its id.
    StartNew,
}

/// Turn checkpointing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CheckpointConfig {
    #[serde(default = "default_unknown_conversation")]
    pub unknown_conversation: UnknownConversationPolicy,

    /// Persist the partial answer when the caller disconnects mid-stream.
    #[serde(default = "default_true")]
    pub persist_partial_on_cancel: bool,

    /// Visible text stored as the assistant message when generation fails.
    #[serde(default = "default_error_marker")]
    pub error_marker: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            unknown_conversation: default_unknown_conversation(),
            persist_partial_on_cancel: true,
            error_marker: default_error_marker(),
        }
    }
}

fn default_unknown_conversation() -> UnknownConversationPolicy {
    UnknownConversationPolicy::Reject
}

fn default_error_marker() -> String {
    "[generation failed] The assistant could not produce a reply.".to_string()
}
