// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chunk sink that records what the orchestrator emits.

use async_trait::async_trait;
use parley_core::BackendId;
use parley_engine::ChunkSink;

/// Event seen by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Chunk(String),
    Restart(BackendId),
}

/// Records chunks and restarts. Can simulate a caller that leaves after a
/// number of chunks.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Vec<SinkEvent>,
    disconnect_after: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Goes away once `chunks` chunks were accepted.
    pub fn disconnecting_after(chunks: usize) -> Self {
        Self {
            events: Vec::new(),
            disconnect_after: Some(chunks),
        }
    }

    pub fn events(&self) -> &[SinkEvent] {
        &self.events
    }

    pub fn chunks(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Chunk(c) => Some(c.as_str()),
                SinkEvent::Restart(_) => None,
            })
            .collect()
    }

    /// Text a caller would show: chunks after the last restart.
    pub fn visible_text(&self) -> String {
        let start = self
            .events
            .iter()
            .rposition(|e| matches!(e, SinkEvent::Restart(_)))
            .map_or(0, |i| i + 1);
        self.events[start..]
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Chunk(c) => Some(c.as_str()),
                SinkEvent::Restart(_) => None,
            })
            .collect()
    }

    fn is_gone(&self) -> bool {
        self.disconnect_after
            .is_some_and(|limit| self.chunks().len() >= limit)
    }
}

#[async_trait]
impl ChunkSink for RecordingSink {
    async fn send(&mut self, chunk: String) -> bool {
        if self.is_gone() {
            return false;
        }
        self.events.push(SinkEvent::Chunk(chunk));
        true
    }

    async fn restart(&mut self, backend: &BackendId) -> bool {
        if self.is_gone() {
            return false;
        }
        self.events.push(SinkEvent::Restart(backend.clone()));
        true
    }

    async fn closed(&self) {
        if self.is_gone() {
            return;
        }
        futures::future::pending::<()>().await;
    }
}
