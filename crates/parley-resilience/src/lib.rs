// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for the Parley generation orchestrator.
//!
//! - [`ProviderStateTracker`]: process-wide ledger of backend failures with a
//!   cooldown window.
//! - [`build_fallback_chain`]: per-request ordered candidate list, filtered by
//!   the tracker.

pub mod chain;
pub mod state;

pub use chain::{build_fallback_chain, FallbackChain};
pub use state::ProviderStateTracker;
