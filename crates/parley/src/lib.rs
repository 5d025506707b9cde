// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parley service assembly.
//!
//! Turns a validated [`ParleyConfig`] into a running [`ChatService`]: one
//! adapter per `[[backends]]` entry, the configured conversation store, and a
//! single process-wide failure tracker.

pub mod echo;

use std::sync::Arc;
use std::time::Duration;

use parley_config::{BackendConfig, BackendKind, ParleyConfig};
use parley_core::{GenerationBackend, ParleyError};
use parley_engine::{BackendRegistry, ChatService};
use parley_resilience::ProviderStateTracker;
use tracing::info;

pub use echo::EchoBackend;

/// Builds the adapter for one backend entry.
pub fn build_backend(
    config: &BackendConfig,
    timeout: Duration,
) -> Result<Arc<dyn GenerationBackend>, ParleyError> {
    match config.kind {
        BackendKind::Echo => Ok(Arc::new(EchoBackend::new(config.id.clone()))),
        #[cfg(feature = "anthropic")]
        BackendKind::Anthropic => Ok(Arc::new(
            parley_anthropic::AnthropicBackend::from_config(config, timeout)?,
        )),
        #[cfg(feature = "openai")]
        BackendKind::Openai => Ok(Arc::new(parley_openai::OpenAiBackend::from_config(
            config, timeout,
        )?)),
        #[allow(unreachable_patterns)]
        other => {
            let _ = timeout;
            Err(ParleyError::Config(format!(
                "backend `{}` has kind {other:?}, which this build does not include",
                config.id
            )))
        }
    }
}

/// Builds every configured backend.
pub fn build_registry(config: &ParleyConfig) -> Result<BackendRegistry, ParleyError> {
    let timeout = config.generation.request_timeout();
    let mut registry = BackendRegistry::new();
    for backend in &config.backends {
        registry.register(build_backend(backend, timeout)?);
    }
    Ok(registry)
}

/// Assembles the chat service from configuration.
pub async fn build_service(config: ParleyConfig) -> Result<ChatService, ParleyError> {
    let registry = build_registry(&config)?;
    let store = parley_storage::open_store(&config.storage).await?;
    let tracker = Arc::new(ProviderStateTracker::new());
    info!(
        backends = registry.len(),
        primary = %config.generation.primary,
        store = store.name(),
        "parley service ready"
    );
    Ok(ChatService::new(Arc::new(config), registry, store, tracker))
}
