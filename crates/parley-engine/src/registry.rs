// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lookup table from backend id to adapter.

use std::collections::HashMap;
use std::sync::Arc;

use parley_core::{BackendId, GenerationBackend, HealthStatus};
use tracing::{debug, warn};

/// Registered generation backends, keyed by configured id.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<BackendId, Arc<dyn GenerationBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a backend under its adapter name. A later registration with the
    /// same id replaces the earlier one.
    pub fn register(&mut self, backend: Arc<dyn GenerationBackend>) {
        let id = BackendId::from(backend.name());
        debug!(backend = %id, "backend registered");
        if self.backends.insert(id.clone(), backend).is_some() {
            warn!(backend = %id, "backend registered twice, keeping the latest");
        }
    }

    pub fn with(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.register(backend);
        self
    }

    pub fn get(&self, id: &BackendId) -> Option<Arc<dyn GenerationBackend>> {
        self.backends.get(id).cloned()
    }

    pub fn contains(&self, id: &BackendId) -> bool {
        self.backends.contains_key(id)
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<BackendId> {
        let mut ids: Vec<BackendId> = self.backends.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Runs every adapter's health check. Errors are reported as unhealthy.
    pub async fn health(&self) -> Vec<(BackendId, HealthStatus)> {
        let mut report = Vec::with_capacity(self.backends.len());
        for id in self.ids() {
            let Some(backend) = self.backends.get(&id) else {
                continue;
            };
            let status = backend
                .health_check()
                .await
                .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
            report.push((id, status));
        }
        report
    }

    /// Shuts every adapter down, logging failures.
    pub async fn shutdown(&self) {
        for (id, backend) in &self.backends {
            if let Err(e) = backend.shutdown().await {
                warn!(backend = %id, error = %e, "backend shutdown failed");
            }
        }
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.ids())
            .finish()
    }
}
