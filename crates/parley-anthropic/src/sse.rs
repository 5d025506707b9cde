// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE stream parser for Anthropic Messages API streaming responses.
//!
//! Converts a reqwest response byte stream into typed [`StreamEvent`] variants
//! using the `eventsource-stream` crate for SSE protocol compliance.

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use parley_core::ParleyError;
use serde::de::DeserializeOwned;

use crate::types::{ApiErrorResponse, SseContentBlockDelta, SseMessageDelta, SseMessageStart};

/// Typed SSE events from the Anthropic streaming protocol.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    MessageStart(SseMessageStart),
    ContentBlockDelta(SseContentBlockDelta),
    MessageDelta(SseMessageDelta),
    MessageStop,
    /// Keep-alive pings and block start/stop markers.
    Heartbeat,
    /// API error reported mid-stream.
    Error(ApiErrorResponse),
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ParleyError>> + Send>>;

/// Parses a reqwest streaming response into a stream of typed [`StreamEvent`]s.
///
/// Unknown event names are skipped per Anthropic's API versioning policy.
pub fn parse_sse_stream(response: reqwest::Response) -> EventStream {
    let mapped = response
        .bytes_stream()
        .eventsource()
        .filter_map(|result| async move {
            match result {
                Ok(event) => parse_event(&event.event, &event.data),
                Err(e) => Some(Err(ParleyError::backend(format!("SSE stream error: {e}")))),
            }
        });

    Box::pin(mapped)
}

fn parse_event(name: &str, data: &str) -> Option<Result<StreamEvent, ParleyError>> {
    let parsed = match name {
        "message_start" => decode(name, data).map(StreamEvent::MessageStart),
        "content_block_delta" => decode(name, data).map(StreamEvent::ContentBlockDelta),
        "message_delta" => decode(name, data).map(StreamEvent::MessageDelta),
        "message_stop" => Ok(StreamEvent::MessageStop),
        "ping" | "content_block_start" | "content_block_stop" => Ok(StreamEvent::Heartbeat),
        "error" => decode(name, data).map(StreamEvent::Error),
        _ => return None,
    };
    Some(parsed)
}

fn decode<T: DeserializeOwned>(name: &str, data: &str) -> Result<T, ParleyError> {
    serde_json::from_str(data)
        .map_err(|e| ParleyError::backend_with(format!("failed to parse {name} event"), e))
}
