// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley generation orchestrator.
//!
//! This crate provides the error taxonomy, domain types, and the adapter
//! traits implemented by generation backends and conversation stores.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{BackendFailure, BoxError, ParleyError, StoreConflict};
pub use types::{
    AdapterType, BackendId, Conversation, ConversationId, HealthStatus, Message, Role, UserId,
};

pub use traits::{ConversationStore, GenerationBackend, PluginAdapter, TextStream};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;

        for variant in [AdapterType::Backend, AdapterType::Store] {
            let s = variant.to_string();
            let parsed = AdapterType::from_str(&s).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn health_status_variants() {
        let healthy = HealthStatus::Healthy;
        let degraded = HealthStatus::Degraded("slow".into());
        let unhealthy = HealthStatus::Unhealthy("down".into());

        assert_eq!(healthy, HealthStatus::Healthy);
        assert_ne!(degraded, healthy);
        assert_ne!(unhealthy, healthy);
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = ConversationId::from("c-1");
        let json = serde_json::to_string(&id).expect("should serialize");
        assert_eq!(json, "\"c-1\"");
        let back: ConversationId = serde_json::from_str(&json).expect("should deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn traits_are_object_safe() {
        fn _assert_backend(_: &dyn GenerationBackend) {}
        fn _assert_store(_: &dyn ConversationStore) {}
    }
}
