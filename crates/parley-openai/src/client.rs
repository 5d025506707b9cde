// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for OpenAI-compatible chat completions endpoints.

use std::time::Duration;

use parley_core::{ParleyError, TextStream};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use crate::decode::{extract_text, ResponseShape};
use crate::sse;
use crate::types::ChatRequest;

/// Default API root; `/chat/completions` is appended.
pub const API_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAiClient {
    /// Creates a client. `api_key` may be absent for local compatible servers.
    pub fn new(api_key: Option<&str>, timeout: Duration) -> Result<Self, ParleyError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                    ParleyError::Config(format!("invalid API key header value: {e}"))
                })?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ParleyError::backend_with("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            endpoint: endpoint_for(API_BASE_URL),
        })
    }

    /// Points the client at another API root (Azure proxies, vLLM, wiremock).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.endpoint = endpoint_for(base_url);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Single-shot completion; returns the decoded text and the layout it came in.
    pub async fn complete(
        &self,
        request: &ChatRequest,
    ) -> Result<(ResponseShape, String), ParleyError> {
        let mut req = request.clone();
        req.stream = false;
        let response = self.send(&req).await?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ParleyError::backend_with("failed to parse API response", e))?;
        extract_text(&body)
    }

    /// Streaming completion; returns non-empty text deltas.
    pub async fn stream(&self, request: &ChatRequest) -> Result<TextStream, ParleyError> {
        let mut req = request.clone();
        req.stream = true;
        let response = self.send(&req).await?;
        Ok(sse::parse_sse_stream(response))
    }

    async fn send(&self, req: &ChatRequest) -> Result<reqwest::Response, ParleyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(req)
            .send()
            .await
            .map_err(|e| ParleyError::backend_with(format!("HTTP request failed: {e}"), e))?;

        let status = response.status();
        debug!(status = %status, stream = req.stream, "chat completions response received");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("error")?
                    .get("message")?
                    .as_str()
                    .map(str::to_string)
            })
            .unwrap_or(body);
        Err(ParleyError::backend(format!("OpenAI API returned {status}: {detail}")))
    }
}

fn endpoint_for(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{base}/chat/completions")
    }
}
