// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-request fallback chain construction.

use std::collections::HashSet;
use std::time::Duration;

use parley_core::BackendId;
use tracing::debug;

use crate::state::ProviderStateTracker;

/// Ordered, deduplicated list of backends to try for one request.
///
/// Never empty when produced by [`build_fallback_chain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackChain {
    candidates: Vec<BackendId>,
}

impl FallbackChain {
    pub fn candidates(&self) -> &[BackendId] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn primary(&self) -> Option<&BackendId> {
        self.candidates.first()
    }
}

impl IntoIterator for FallbackChain {
    type Item = BackendId;
    type IntoIter = std::vec::IntoIter<BackendId>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

/// Builds the chain for one request.
///
/// `primary` comes first, then `fallbacks` in order; duplicates are dropped and
/// every backend still inside its cooldown window is skipped. If that leaves
/// nothing, the chain is the primary alone so the request still gets one attempt.
pub fn build_fallback_chain(
    primary: &BackendId,
    fallbacks: &[BackendId],
    cooldown: Duration,
    tracker: &ProviderStateTracker,
) -> FallbackChain {
    let mut seen = HashSet::new();
    let mut candidates = Vec::with_capacity(fallbacks.len() + 1);
    let mut skipped = Vec::new();

    for id in std::iter::once(primary).chain(fallbacks) {
        if !seen.insert(id) {
            continue;
        }
        if tracker.is_available(id, cooldown) {
            candidates.push(id.clone());
        } else {
            skipped.push(id.as_str());
        }
    }

    if candidates.is_empty() {
        debug!(backend = %primary, ?skipped, "every candidate cooling down, keeping primary");
        candidates.push(primary.clone());
    } else if !skipped.is_empty() {
        debug!(?skipped, "skipped cooling-down backends");
    }

    FallbackChain { candidates }
}
