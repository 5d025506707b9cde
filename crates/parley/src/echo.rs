// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local backend that echoes the prompt. Needs no network or credentials.

use async_trait::async_trait;
use futures::stream;
use parley_core::{
    AdapterType, GenerationBackend, HealthStatus, ParleyError, PluginAdapter, TextStream,
};

/// Replies `Echo: {prompt}`; streams it word by word.
#[derive(Debug, Clone)]
pub struct EchoBackend {
    id: String,
}

impl EchoBackend {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    fn reply(prompt: &str) -> String {
        format!("Echo: {prompt}")
    }
}

#[async_trait]
impl PluginAdapter for EchoBackend {
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
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for EchoBackend {
    async fn generate(&self, prompt: &str) -> Result<String, ParleyError> {
        Ok(Self::reply(prompt))
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream, ParleyError> {
        let words: Vec<Result<String, ParleyError>> = Self::reply(prompt)
            .split_inclusive(' ')
            .map(|w| Ok(w.to_string()))
            .collect();
        Ok(Box::pin(stream::iter(words)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn echoes_prompt() {
        let echo = EchoBackend::new("echo");
        assert_eq!(echo.generate("Hello").await.unwrap(), "Echo: Hello");
    }

    #[tokio::test]
    async fn stream_concatenates_to_reply() {
        let echo = EchoBackend::new("echo");
        let chunks: Vec<String> = echo
            .generate_stream("two words")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks, vec!["Echo: ", "two ", "words"]);
    }
}
