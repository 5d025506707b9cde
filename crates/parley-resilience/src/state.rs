// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-backend cooldown ledger.
//!
//! One tracker is created at startup and shared (`Arc`) by every in-flight
//! request. Entries map a backend to the instant of its most recent failure and
//! are cleared by the first success afterwards. The map is sharded
//! (`DashMap`), so marking and checking never hold a lock across an await.

use std::time::Duration;

use dashmap::DashMap;
use parley_core::BackendId;
use tokio::time::Instant;
use tracing::{debug, info};

/// Records when each backend last failed.
#[derive(Debug, Default)]
pub struct ProviderStateTracker {
    failures: DashMap<BackendId, Instant>,
}

impl ProviderStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records now as the last failure of `id`.
    pub fn mark_failed(&self, id: &BackendId) {
        self.failures.insert(id.clone(), Instant::now());
        debug!(backend = %id, "backend marked failed");
    }

    /// Clears any stored failure for `id`.
    pub fn mark_succeeded(&self, id: &BackendId) {
        if self.failures.remove(id).is_some() {
            info!(backend = %id, "backend recovered");
        }
    }

    /// False iff `id` failed within `cooldown` of now. Unknown ids are available.
    pub fn is_available(&self, id: &BackendId, cooldown: Duration) -> bool {
        match self.failures.get(id) {
            Some(failed_at) => failed_at.elapsed() >= cooldown,
            None => true,
        }
    }

    /// Instant of the last recorded failure, if any.
    pub fn last_failure(&self, id: &BackendId) -> Option<Instant> {
        self.failures.get(id).map(|entry| *entry)
    }

    /// Backends that currently have a recorded failure, sorted by id.
    pub fn failed_backends(&self) -> Vec<BackendId> {
        let mut ids: Vec<BackendId> = self.failures.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Administrative clear of every recorded failure.
    pub fn reset(&self) {
        let cleared = self.failures.len();
        self.failures.clear();
        info!(cleared, "provider state reset");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn unknown_backend_is_available() {
        let tracker = ProviderStateTracker::new();
        assert!(tracker.is_available(&BackendId::from("never-seen"), COOLDOWN));
        assert!(tracker.last_failure(&BackendId::from("never-seen")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_backend_cools_down_then_returns() {
        let tracker = ProviderStateTracker::new();
        let id = BackendId::from("primary");

        tracker.mark_failed(&id);
        assert!(!tracker.is_available(&id, COOLDOWN));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!tracker.is_available(&id, COOLDOWN));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(tracker.is_available(&id, COOLDOWN));
        // The entry stays until a success clears it.
        assert_eq!(tracker.failed_backends(), vec![id]);
    }

    #[tokio::test(start_paused = true)]
    async fn success_clears_failure() {
        let tracker = ProviderStateTracker::new();
        let id = BackendId::from("primary");
        tracker.mark_failed(&id);
        tracker.mark_succeeded(&id);
        assert!(tracker.is_available(&id, COOLDOWN));
        assert!(tracker.failed_backends().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn marking_failed_again_restarts_window() {
        let tracker = ProviderStateTracker::new();
        let id = BackendId::from("primary");
        tracker.mark_failed(&id);
        tokio::time::advance(Duration::from_secs(50)).await;
        tracker.mark_failed(&id);
        tokio::time::advance(Duration::from_secs(50)).await;
        assert!(!tracker.is_available(&id, COOLDOWN));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_everything() {
        let tracker = ProviderStateTracker::new();
        tracker.mark_failed(&BackendId::from("a"));
        tracker.mark_failed(&BackendId::from("b"));
        tracker.reset();
        assert!(tracker.failed_backends().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_marks_do_not_corrupt_state() {
        let tracker = Arc::new(ProviderStateTracker::new());
        let mut handles = Vec::new();
        for task in 0..16 {
            let tracker = Arc::clone(&tracker);
            handles.push(tokio::spawn(async move {
                for round in 0..200 {
                    let id = BackendId::from(format!("backend-{}", (task + round) % 4));
                    if round % 3 == 0 {
                        tracker.mark_succeeded(&id);
                    } else {
                        tracker.mark_failed(&id);
                    }
                    let _ = tracker.is_available(&id, COOLDOWN);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(tracker.failed_backends().len() <= 4);
    }
}
