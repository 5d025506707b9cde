// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response-body decoding for OpenAI-compatible servers.
//!
//! Compatible servers disagree on where the generated text lives. Rather than
//! probing fields ad hoc, every supported layout is one row of [`KNOWN_SHAPES`],
//! tried in order. A body that matches no row is rejected with
//! [`ParleyError::UnrecognizedResponseShape`].

use parley_core::ParleyError;
use serde_json::Value;

/// A response layout this crate knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `choices[0].message.content` as a string or as text parts.
    ChatCompletion,
    /// `choices[0].text` (legacy completions endpoint).
    LegacyCompletion,
    /// `output_text` (Responses API convenience field).
    ResponsesOutputText,
    /// `output[*].content[*].text` with `type == "output_text"` (Responses API).
    ResponsesOutput,
    /// `content[*].text` with `type == "text"` (Messages-style gateways).
    MessagesContent,
    /// `results[0].outputText` (Titan-style gateways).
    TitanResults,
    /// `message.content` (Ollama chat).
    OllamaChat,
}

type Extractor = fn(&Value) -> Option<String>;

/// Supported layouts, in match priority.
pub const KNOWN_SHAPES: &[(ResponseShape, Extractor)] = &[
    (ResponseShape::ChatCompletion, chat_completion),
    (ResponseShape::LegacyCompletion, legacy_completion),
    (ResponseShape::ResponsesOutputText, responses_output_text),
    (ResponseShape::ResponsesOutput, responses_output),
    (ResponseShape::MessagesContent, messages_content),
    (ResponseShape::TitanResults, titan_results),
    (ResponseShape::OllamaChat, ollama_chat),
];

/// Extracts the generated text from a response body.
///
/// Returns the matched shape alongside the text. The text may be empty; deciding
/// whether empty output is a failure is the caller's concern.
pub fn extract_text(body: &Value) -> Result<(ResponseShape, String), ParleyError> {
    KNOWN_SHAPES
        .iter()
        .find_map(|(shape, extract)| extract(body).map(|text| (*shape, text)))
        .ok_or_else(|| ParleyError::UnrecognizedResponseShape {
            keys: top_level_keys(body),
        })
}

fn top_level_keys(body: &Value) -> Vec<String> {
    match body.as_object() {
        Some(map) => map.keys().cloned().collect(),
        None => vec![format!("<{}>", json_type(body))],
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn first_choice(body: &Value) -> Option<&Value> {
    body.get("choices")?.as_array()?.first()
}

fn chat_completion(body: &Value) -> Option<String> {
    let content = first_choice(body)?.get("message")?.get("content")?;
    match content {
        Value::String(s) => Some(s.clone()),
        // Refusals and tool calls come back with null content.
        Value::Null => Some(String::new()),
        Value::Array(parts) => Some(join_typed_text(parts, "text")),
        _ => None,
    }
}

fn legacy_completion(body: &Value) -> Option<String> {
    first_choice(body)?.get("text")?.as_str().map(str::to_string)
}

fn responses_output_text(body: &Value) -> Option<String> {
    body.get("output_text")?.as_str().map(str::to_string)
}

fn responses_output(body: &Value) -> Option<String> {
    let items = body.get("output")?.as_array()?;
    let mut text = String::new();
    let mut matched = false;
    for item in items {
        if let Some(parts) = item.get("content").and_then(Value::as_array) {
            matched = true;
            text.push_str(&join_typed_text(parts, "output_text"));
        }
    }
    matched.then_some(text)
}

fn messages_content(body: &Value) -> Option<String> {
    let parts = body.get("content")?.as_array()?;
    Some(join_typed_text(parts, "text"))
}

fn titan_results(body: &Value) -> Option<String> {
    body.get("results")?
        .as_array()?
        .first()?
        .get("outputText")?
        .as_str()
        .map(str::to_string)
}

fn ollama_chat(body: &Value) -> Option<String> {
    body.get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

/// Concatenates `text` of every part whose `type` equals `kind`.
fn join_typed_text(parts: &[Value], kind: &str) -> String {
    parts
        .iter()
        .filter(|p| p.get("type").and_then(Value::as_str) == Some(kind))
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect()
}

/// Extracts the text delta from one streaming chunk (`choices[0].delta.content`).
///
/// `Ok(None)` for chunks that carry no text (role preamble, finish markers).
/// An `error` object inside the chunk is a backend failure.
pub fn extract_delta(chunk: &Value) -> Result<Option<String>, ParleyError> {
    if let Some(error) = chunk.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ParleyError::backend(format!("stream error: {message}")));
    }
    let Some(choice) = first_choice(chunk) else {
        return Ok(None);
    };
    Ok(choice
        .get("delta")
        .and_then(|d| d.get("content"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string))
}
