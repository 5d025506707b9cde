// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks cross-references between sections (primary and fallbacks must name
//! configured backends) and numeric bounds that serde cannot express.

use std::collections::HashSet;

use crate::diagnostic::{suggest_key, ConfigError};
use crate::model::{BackendKind, ParleyConfig, StorageBackend};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns all collected validation errors (does not fail fast).
pub fn validate_config(config: &ParleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut push = |message: String| errors.push(ConfigError::Validation { message });

    if config.backends.is_empty() {
        push("at least one [[backends]] entry is required".to_string());
    }

    let mut seen = HashSet::new();
    for (i, backend) in config.backends.iter().enumerate() {
        if backend.id.trim().is_empty() {
            push(format!("backends[{i}].id must not be empty"));
        } else if !seen.insert(backend.id.as_str()) {
            push(format!(
                "duplicate backend id `{}` in [[backends]] array",
                backend.id
            ));
        }

        let remote = matches!(backend.kind, BackendKind::Anthropic | BackendKind::Openai);
        if remote
            && backend
                .model
                .as_deref()
                .is_none_or(|m| m.trim().is_empty())
        {
            push(format!(
                "backends[{i}] (`{}`) needs a `model` for remote backends",
                backend.id
            ));
        }

        if !(0.0..=2.0).contains(&backend.temperature) {
            push(format!(
                "backends[{i}].temperature must be between 0.0 and 2.0, got {}",
                backend.temperature
            ));
        }

        if backend.max_tokens == 0 {
            push(format!("backends[{i}].max_tokens must be at least 1"));
        }
    }

    let ids: Vec<&str> = config.backends.iter().map(|b| b.id.as_str()).collect();
    let mut check_ref = |field: String, id: &str| {
        if !ids.contains(&id) {
            errors.push(ConfigError::UnknownBackend {
                field,
                id: id.to_string(),
                suggestion: suggest_key(id, &ids),
                known: ids.join(", "),
            });
        }
    };

    check_ref("generation.primary".to_string(), &config.generation.primary);
    for (i, fallback) in config.generation.fallbacks.iter().enumerate() {
        check_ref(format!("generation.fallbacks[{i}]"), fallback);
    }

    let mut push = |message: String| errors.push(ConfigError::Validation { message });
    let gen_cfg = &config.generation;
    for (name, value) in [
        ("max_response_chars", gen_cfg.max_response_chars as u64),
        ("simulated_chunk_chars", gen_cfg.simulated_chunk_chars as u64),
        ("stream_idle_timeout_secs", gen_cfg.stream_idle_timeout_secs),
        ("request_timeout_secs", gen_cfg.request_timeout_secs),
        ("fragment_buffer", gen_cfg.fragment_buffer as u64),
    ] {
        if value == 0 {
            push(format!("generation.{name} must be at least 1"));
        }
    }

    if config.storage.backend == StorageBackend::Sqlite
        && config.storage.database_path.trim().is_empty()
    {
        push("storage.database_path must not be empty".to_string());
    }

    if config.checkpoint.error_marker.trim().is_empty() {
        push("checkpoint.error_marker must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BackendConfig;

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains(needle)),
        )
    }

    #[test]
    fn default_config_validates() {
        let config = ParleyConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn unknown_primary_suggests_close_id() {
        let mut config = ParleyConfig::default();
        config.generation.primary = "ecko".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::UnknownBackend { field, id, suggestion, .. }
                if field == "generation.primary" && id == "ecko" && suggestion.as_deref() == Some("echo")
        )));
    }

    #[test]
    fn unknown_fallback_fails_validation() {
        let mut config = ParleyConfig::default();
        config.generation.fallbacks = vec!["missing".to_string()];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::UnknownBackend { field, .. } if field == "generation.fallbacks[0]"
        )));
    }

    #[test]
    fn duplicate_backend_ids_fail_validation() {
        let mut config = ParleyConfig::default();
        let echo = config.backends[0].clone();
        config.backends.push(echo);
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "duplicate backend id `echo`"));
    }

    #[test]
    fn remote_backend_requires_model() {
        let mut config = ParleyConfig::default();
        config.backends.push(BackendConfig {
            id: "claude".to_string(),
            kind: BackendKind::Anthropic,
            model: None,
            api_key: None,
            base_url: None,
            api_version: None,
            max_tokens: 500,
            temperature: 0.7,
            system_prompt: None,
        });
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "needs a `model`"));
    }

    #[test]
    fn zero_bounds_are_all_reported() {
        let mut config = ParleyConfig::default();
        config.generation.max_response_chars = 0;
        config.generation.simulated_chunk_chars = 0;
        config.storage.database_path = " ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(has_message(&errors, "max_response_chars"));
        assert!(has_message(&errors, "simulated_chunk_chars"));
        assert!(has_message(&errors, "database_path"));
    }

    #[test]
    fn memory_storage_ignores_database_path() {
        let mut config = ParleyConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config.storage.database_path = String::new();
        assert!(validate_config(&config).is_ok());
    }
}
