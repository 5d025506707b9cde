// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude generation backend for Parley.
//!
//! Implements [`GenerationBackend`] over the Anthropic Messages API, with
//! single-shot completion and streaming SSE text deltas.

pub mod client;
pub mod sse;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::StreamExt;
use parley_config::BackendConfig;
use parley_core::{
    AdapterType, GenerationBackend, HealthStatus, ParleyError, PluginAdapter, TextStream,
};
use tracing::{debug, info};

use crate::client::{AnthropicClient, DEFAULT_API_VERSION};
use crate::sse::StreamEvent;
use crate::types::{ApiMessage, MessageRequest, SseDelta};

/// Anthropic-backed [`GenerationBackend`].
///
/// API key resolution order: backend config, then `ANTHROPIC_API_KEY`.
pub struct AnthropicBackend {
    id: String,
    client: AnthropicClient,
    model: String,
    max_tokens: u32,
    temperature: f32,
    system_prompt: Option<String>,
}

impl AnthropicBackend {
    /// Builds the backend for one `[[backends]]` entry of kind `anthropic`.
    pub fn from_config(config: &BackendConfig, timeout: Duration) -> Result<Self, ParleyError> {
        let api_key = resolve_api_key(config.api_key.as_deref())?;
        let api_version = config.api_version.as_deref().unwrap_or(DEFAULT_API_VERSION);
        let model = config.model.clone().ok_or_else(|| {
            ParleyError::Config(format!("backend `{}` has no model configured", config.id))
        })?;

        let mut client = AnthropicClient::new(&api_key, api_version, timeout)?;
        if let Some(url) = &config.base_url {
            client = client.with_base_url(url.clone());
        }

        info!(backend = %config.id, model = %model, "Anthropic backend initialized");

        Ok(Self {
            id: config.id.clone(),
            client,
            model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            system_prompt: config.system_prompt.clone(),
        })
    }

    fn to_message_request(&self, prompt: &str) -> MessageRequest {
        MessageRequest {
            model: self.model.clone(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            system: self.system_prompt.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        }
    }
}

#[async_trait]
impl PluginAdapter for AnthropicBackend {
    fn name(&self) -> &str {
        &self.id
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Backend
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        // No API call: health checks must not consume tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        debug!(backend = %self.id, "Anthropic backend shutting down");
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    async fn generate(&self, prompt: &str) -> Result<String, ParleyError> {
        let response = self
            .client
            .complete_message(&self.to_message_request(prompt))
            .await?;
        debug!(
            backend = %self.id,
            model = %response.model,
            output_tokens = response.usage.output_tokens,
            stop_reason = ?response.stop_reason,
            "completion finished"
        );
        Ok(response.text())
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream, ParleyError> {
        let events = self
            .client
            .stream_message(&self.to_message_request(prompt))
            .await?;

        let text = events.filter_map(|result| async move {
            match result {
                Ok(event) => event_to_text(event),
                Err(e) => Some(Err(e)),
            }
        });
        Ok(Box::pin(text))
    }
}

/// Keeps non-empty text deltas and turns mid-stream API errors into failures.
fn event_to_text(event: StreamEvent) -> Option<Result<String, ParleyError>> {
    match event {
        StreamEvent::ContentBlockDelta(delta) => match delta.delta {
            SseDelta::TextDelta { text } if !text.is_empty() => Some(Ok(text)),
            _ => None,
        },
        StreamEvent::Error(err) => Some(Err(ParleyError::backend(format!(
            "Anthropic stream error ({}): {}",
            err.error.type_, err.error.message
        )))),
        StreamEvent::MessageStart(_)
        | StreamEvent::MessageDelta(_)
        | StreamEvent::MessageStop
        | StreamEvent::Heartbeat => None,
    }
}

fn resolve_api_key(config_key: Option<&str>) -> Result<String, ParleyError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.to_string());
    }

    std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
        ParleyError::Config(
            "Anthropic API key not found. Set api_key on the backend or the ANTHROPIC_API_KEY environment variable.".into(),
        )
    })
}
