// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Anthropic Messages API.
//!
//! One request per call. Transient statuses are reported to the caller, never
//! retried here; fallback policy lives in the orchestrator.

use std::time::Duration;

use parley_core::ParleyError;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use crate::sse::{self, EventStream};
use crate::types::{ApiErrorResponse, MessageRequest, MessageResponse};

/// Default endpoint of the Anthropic Messages API.
pub const API_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// Default `anthropic-version` header value.
pub const DEFAULT_API_VERSION: &str = "2023-06-01";

/// HTTP client for Anthropic API communication.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    base_url: String,
}

impl AnthropicClient {
    /// Creates a client with authentication headers baked in.
    pub fn new(api_key: &str, api_version: &str, timeout: Duration) -> Result<Self, ParleyError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| ParleyError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(api_version).map_err(|e| {
                ParleyError::Config(format!("invalid API version header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ParleyError::backend_with("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Overrides the endpoint (proxies, wiremock).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends a streaming request and returns the parsed SSE event stream.
    pub async fn stream_message(&self, request: &MessageRequest) -> Result<EventStream, ParleyError> {
        let mut req = request.clone();
        req.stream = true;
        let response = self.send(&req).await?;
        Ok(sse::parse_sse_stream(response))
    }

    /// Sends a non-streaming request and returns the full response.
    pub async fn complete_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, ParleyError> {
        let mut req = request.clone();
        req.stream = false;
        let response = self.send(&req).await?;

        let body = response
            .text()
            .await
            .map_err(|e| ParleyError::backend_with("failed to read response body", e))?;
        serde_json::from_str(&body)
            .map_err(|e| ParleyError::backend_with("failed to parse API response", e))
    }

    async fn send(&self, req: &MessageRequest) -> Result<reqwest::Response, ParleyError> {
        let response = self
            .client
            .post(&self.base_url)
            .json(req)
            .send()
            .await
            .map_err(|e| ParleyError::backend_with(format!("HTTP request failed: {e}"), e))?;

        let status = response.status();
        debug!(status = %status, stream = req.stream, "anthropic response received");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ParleyError::backend(error_message(status, &body)))
    }
}

/// Formats a non-2xx response, preferring the structured API error body.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) => format!(
            "Anthropic API error {status} ({}): {}",
            api_err.error.type_, api_err.error.message
        ),
        Err(_) => format!("Anthropic API returned {status}: {body}"),
    }
}
