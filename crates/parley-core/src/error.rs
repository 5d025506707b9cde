// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parley generation orchestrator.

use std::fmt;

use thiserror::Error;

use crate::types::{BackendId, ConversationId};

/// Boxed error cause carried by adapter and storage failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type used across all Parley adapter traits and core operations.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Configuration errors (invalid TOML, unknown backend ids, bad bounds).
    #[error("configuration error: {0}")]
    Config(String),

    /// A single backend attempt failed (transport, HTTP status, malformed payload).
    #[error("backend error: {message}")]
    Backend {
        message: String,
        source: Option<BoxError>,
    },

    /// A stream completed without producing any text.
    #[error("backend stream completed without producing any text")]
    EmptyStream,

    /// A vendor response did not match any known decoding shape.
    #[error("unrecognized response shape (top-level keys: {})", .keys.join(", "))]
    UnrecognizedResponseShape { keys: Vec<String> },

    /// Every candidate in the fallback chain was exhausted.
    #[error("all backends failed: {}", summarize(.attempts))]
    AllBackendsFailed { attempts: Vec<BackendFailure> },

    /// The caller referenced a conversation that does not exist for them.
    #[error("conversation not found: {id}")]
    ConversationNotFound { id: ConversationId },

    /// A message violated its content invariants.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Conversation store failure (connection, query, serialization).
    #[error("store error: {source}")]
    Store { source: BoxError },

    /// A chain referenced a backend id with no registered adapter.
    #[error("backend not registered: {0}")]
    BackendNotRegistered(BackendId),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A save the store refused because it would rewrite persisted history.
///
/// Carried as the source of [`ParleyError::Store`].
#[derive(Debug, Error)]
pub enum StoreConflict {
    #[error("conversation {id} belongs to another user")]
    OwnerChanged { id: ConversationId },

    /// The stored messages are not a prefix of the snapshot being saved:
    /// someone else appended since it was loaded.
    #[error(
        "conversation {id} changed since it was loaded ({stored} stored messages, snapshot carries {incoming})"
    )]
    StaleSnapshot {
        id: ConversationId,
        stored: usize,
        incoming: usize,
    },
}

impl ParleyError {
    /// Builds a [`ParleyError::Backend`] without an underlying cause.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a [`ParleyError::Backend`] wrapping an underlying cause.
    pub fn backend_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Builds a [`ParleyError::Store`] from any error.
    pub fn store(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Store {
            source: Box::new(source),
        }
    }

    /// The store conflict behind a [`ParleyError::Store`], if that is what failed.
    pub fn store_conflict(&self) -> Option<&StoreConflict> {
        match self {
            Self::Store { source } => source.downcast_ref::<StoreConflict>(),
            _ => None,
        }
    }

    /// Whether a save lost a race with another writer and may be retried on fresh state.
    pub fn is_stale_snapshot(&self) -> bool {
        matches!(self.store_conflict(), Some(StoreConflict::StaleSnapshot { .. }))
    }

    /// Stable snake_case label, used in caller-facing error fragments.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Backend { .. } => "backend_error",
            Self::EmptyStream => "empty_stream",
            Self::UnrecognizedResponseShape { .. } => "unrecognized_response_shape",
            Self::AllBackendsFailed { .. } => "all_backends_failed",
            Self::ConversationNotFound { .. } => "conversation_not_found",
            Self::InvalidMessage(_) => "invalid_message",
            Self::Store { .. } => "store_error",
            Self::BackendNotRegistered(_) => "backend_not_registered",
            Self::Timeout { .. } => "timeout",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whether the orchestrator may move on to another attempt after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Backend { .. }
                | Self::EmptyStream
                | Self::UnrecognizedResponseShape { .. }
                | Self::BackendNotRegistered(_)
                | Self::Timeout { .. }
        )
    }

    /// For [`ParleyError::AllBackendsFailed`], the last error recorded by the last attempt.
    pub fn last_backend_error(&self) -> Option<&ParleyError> {
        match self {
            Self::AllBackendsFailed { attempts } => {
                attempts.last().and_then(|a| a.errors.last())
            }
            _ => None,
        }
    }
}

/// All errors recorded against one backend during one request.
#[derive(Debug)]
pub struct BackendFailure {
    pub backend: BackendId,
    /// Errors in attempt order (native stream first, then single-shot).
    pub errors: Vec<ParleyError>,
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.backend)?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        f.write_str(")")
    }
}

fn summarize(attempts: &[BackendFailure]) -> String {
    if attempts.is_empty() {
        return "no backend was attempted".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_backends_failed_lists_each_backend() {
        let err = ParleyError::AllBackendsFailed {
            attempts: vec![
                BackendFailure {
                    backend: BackendId::from("primary"),
                    errors: vec![ParleyError::EmptyStream, ParleyError::backend("503")],
                },
                BackendFailure {
                    backend: BackendId::from("secondary"),
                    errors: vec![ParleyError::backend("connection refused")],
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("primary (backend stream completed"));
        assert!(msg.contains("backend error: 503"));
        assert!(msg.contains("secondary (backend error: connection refused)"));
        assert_eq!(err.kind(), "all_backends_failed");
        assert!(!err.is_recoverable());

        let last = err.last_backend_error().expect("last error");
        assert_eq!(last.to_string(), "backend error: connection refused");
    }

    #[test]
    fn unrecognized_shape_lists_keys() {
        let err = ParleyError::UnrecognizedResponseShape {
            keys: vec!["foo".into(), "bar".into()],
        };
        assert_eq!(
            err.to_string(),
            "unrecognized response shape (top-level keys: foo, bar)"
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn backend_with_keeps_source() {
        let err = ParleyError::backend_with("send failed", std::io::Error::other("reset"));
        let source = std::error::Error::source(&err);
        assert!(source.is_some());
        assert_eq!(err.kind(), "backend_error");
    }

    #[test]
    fn store_errors_are_terminal() {
        let err = ParleyError::store(std::io::Error::other("disk full"));
        assert_eq!(err.kind(), "store_error");
        assert!(!err.is_recoverable());
        assert!(err.last_backend_error().is_none());
    }

    #[test]
    fn store_conflicts_are_typed_store_errors() {
        let stale = ParleyError::store(StoreConflict::StaleSnapshot {
            id: ConversationId::from("c-1"),
            stored: 4,
            incoming: 4,
        });
        assert_eq!(stale.kind(), "store_error");
        assert!(stale.is_stale_snapshot());
        assert!(stale.to_string().contains("changed since it was loaded"));

        let owner = ParleyError::store(StoreConflict::OwnerChanged {
            id: ConversationId::from("c-1"),
        });
        assert!(matches!(
            owner.store_conflict(),
            Some(StoreConflict::OwnerChanged { .. })
        ));
        assert!(!owner.is_stale_snapshot());
        assert!(ParleyError::store(std::io::Error::other("io")).store_conflict().is_none());
    }
}
