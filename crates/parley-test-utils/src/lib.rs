// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Parley integration tests.
//!
//! Provides scripted adapters and test harness infrastructure for fast,
//! deterministic tests without external services.
//!
//! # Components
//!
//! - [`ScriptedBackend`] - generation backend replaying queued behaviors
//! - [`FlakyStore`] - conversation store with failure injection
//! - [`RecordingSink`] - chunk sink that records orchestrator output
//! - [`TestHarness`] - assembled `ChatService` for end-to-end tests

pub mod flaky_store;
pub mod harness;
pub mod recording_sink;
pub mod scripted_backend;

pub use flaky_store::FlakyStore;
pub use harness::{TestHarness, TestHarnessBuilder, streamed_text};
pub use recording_sink::{RecordingSink, SinkEvent};
pub use scripted_backend::{GenerateBehavior, ScriptedBackend, StreamBehavior};
