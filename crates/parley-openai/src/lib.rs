// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible generation backend for Parley.
//!
//! Talks to `/chat/completions` on api.openai.com or any compatible server.
//! Response layouts are decoded through the table in [`decode`].

pub mod client;
pub mod decode;
pub mod sse;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use parley_config::BackendConfig;
use parley_core::{
    AdapterType, GenerationBackend, HealthStatus, ParleyError, PluginAdapter, TextStream,
};
use tracing::{debug, info};

use crate::client::OpenAiClient;
use crate::types::{ChatRequest, DEFAULT_SYSTEM_PROMPT};

/// OpenAI-compatible [`GenerationBackend`].
///
/// API key resolution order: backend config, then `OPENAI_API_KEY`. A custom
/// `base_url` may run without a key.
pub struct OpenAiBackend {
    id: String,
    client: OpenAiClient,
    model: String,
    max_tokens: u32,
    temperature: f32,
    system_prompt: String,
}

impl OpenAiBackend {
    /// Builds the backend for one `[[backends]]` entry of kind `openai`.
    pub fn from_config(config: &BackendConfig, timeout: Duration) -> Result<Self, ParleyError> {
        let api_key = resolve_api_key(config.api_key.as_deref(), config.base_url.is_some())?;
        let model = config.model.clone().ok_or_else(|| {
            ParleyError::Config(format!("backend `{}` has no model configured", config.id))
        })?;

        let mut client = OpenAiClient::new(api_key.as_deref(), timeout)?;
        if let Some(url) = &config.base_url {
            client = client.with_base_url(url);
        }

        info!(
            backend = %config.id,
            model = %model,
            endpoint = client.endpoint(),
            "OpenAI-compatible backend initialized"
        );

        Ok(Self {
            id: config.id.clone(),
            client,
            model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        })
    }

    fn request(&self, prompt: &str) -> ChatRequest {
        ChatRequest::new(
            &self.model,
            &self.system_prompt,
            prompt,
            self.max_tokens,
            self.temperature,
        )
    }
}

#[async_trait]
impl PluginAdapter for OpenAiBackend {
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
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        debug!(backend = %self.id, "OpenAI-compatible backend shutting down");
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    async fn generate(&self, prompt: &str) -> Result<String, ParleyError> {
        let (shape, text) = self.client.complete(&self.request(prompt)).await?;
        debug!(backend = %self.id, ?shape, chars = text.chars().count(), "completion decoded");
        Ok(text)
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream, ParleyError> {
        self.client.stream(&self.request(prompt)).await
    }
}

fn resolve_api_key(config_key: Option<&str>, custom_base: bool) -> Result<Option<String>, ParleyError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(Some(key.to_string()));
    }
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(Some(key)),
        _ if custom_base => Ok(None),
        _ => Err(ParleyError::Config(
            "OpenAI API key not found. Set api_key on the backend or the OPENAI_API_KEY environment variable.".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use parley_config::BackendKind;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> OpenAiBackend {
        let cfg = BackendConfig {
            id: "gpt".into(),
            kind: BackendKind::Openai,
            model: Some("gpt-4o-mini".into()),
            api_key: Some("sk-test".into()),
            base_url: Some(server.uri()),
            api_version: None,
            max_tokens: 500,
            temperature: 0.7,
            system_prompt: None,
        };
        OpenAiBackend::from_config(&cfg, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn generate_uses_default_system_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "stream": false,
                "messages": [
                    {"role": "system", "content": DEFAULT_SYSTEM_PROMPT},
                    {"role": "user", "content": "Hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Hi!"}}]
            })))
            .mount(&server)
            .await;

        assert_eq!(backend(&server).generate("Hello").await.unwrap(), "Hi!");
    }

    #[tokio::test]
    async fn generate_stream_yields_deltas() {
        let server = MockServer::start().await;
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"B\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&server)
            .await;

        let chunks: Vec<String> = backend(&server)
            .generate_stream("Hello")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn custom_base_url_may_omit_key() {
        assert!(resolve_api_key(None, true).is_ok());
        assert_eq!(
            resolve_api_key(Some("k"), false).unwrap().as_deref(),
            Some("k")
        );
    }
}
