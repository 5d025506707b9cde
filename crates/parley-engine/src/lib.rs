// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation engine for Parley.
//!
//! - [`ResponseAccumulator`]: bounds and concatenates generated text.
//! - [`StreamingOrchestrator`]: walks the fallback chain with native streaming
//!   first and simulated streaming as the per-backend fallback.
//! - [`Checkpointer`]: persists the user turn before generation and the
//!   assistant turn (or an error marker) after it.
//! - [`ChatService`]: the caller-facing `submit` / `submit_stream` operations.

pub mod accumulator;
pub mod checkpoint;
pub mod fragment;
pub mod orchestrator;
pub mod registry;
pub mod service;

pub use accumulator::{ResponseAccumulator, TRUNCATION_NOTICE};
pub use checkpoint::{Checkpointer, INTERRUPTED_NOTICE, Turn, TurnState};
pub use fragment::StreamFragment;
pub use orchestrator::{
    ChunkSink, OrchestratorSettings, OrchestratorState, StreamOutcome, StreamSession,
    StreamingOrchestrator,
};
pub use registry::BackendRegistry;
pub use service::{ChatReply, ChatRequest, ChatService, FragmentStream};
