// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE parser for OpenAI-compatible streaming responses.
//!
//! Each `data:` payload is a JSON chunk with `choices[0].delta.content`; the
//! literal `[DONE]` ends the stream.

use eventsource_stream::Eventsource;
use futures::stream::StreamExt;
use parley_core::{ParleyError, TextStream};

use crate::decode::extract_delta;

const DONE_MARKER: &str = "[DONE]";

/// Turns a streaming response into a stream of non-empty text deltas.
pub fn parse_sse_stream(response: reqwest::Response) -> TextStream {
    let deltas = response
        .bytes_stream()
        .eventsource()
        .take_while(|result| {
            let done = matches!(result, Ok(event) if event.data.trim() == DONE_MARKER);
            futures::future::ready(!done)
        })
        .filter_map(|result| async move {
            match result {
                Ok(event) => parse_data(&event.data).transpose(),
                Err(e) => Some(Err(ParleyError::backend(format!("SSE stream error: {e}")))),
            }
        });

    Box::pin(deltas)
}

fn parse_data(data: &str) -> Result<Option<String>, ParleyError> {
    let chunk: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| ParleyError::backend_with("failed to parse stream chunk", e))?;
    extract_delta(&chunk)
}
