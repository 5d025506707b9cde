// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation backend trait (Anthropic, OpenAI-compatible, local echo).

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;

/// Lazy, finite, non-restartable sequence of text chunks.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ParleyError>> + Send>>;

/// One external text-generation service.
///
/// Implementations report failures as [`ParleyError::Backend`] and never retry
/// internally. Retry and fallback belong to the orchestrator.
#[async_trait]
pub trait GenerationBackend: PluginAdapter {
    /// Produces the complete response in one call.
    async fn generate(&self, prompt: &str) -> Result<String, ParleyError>;

    /// Produces the response incrementally.
    ///
    /// May fail before the first chunk (returned `Err`) or mid-sequence (an
    /// `Err` item). A stream that ends without any text is treated by callers
    /// as [`ParleyError::EmptyStream`].
    async fn generate_stream(&self, prompt: &str) -> Result<TextStream, ParleyError>;
}
