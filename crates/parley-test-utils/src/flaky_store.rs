// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation store that starts failing on demand.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parley_core::{
    AdapterType, Conversation, ConversationId, ConversationStore, HealthStatus, ParleyError,
    PluginAdapter, UserId,
};
use parley_storage::MemoryConversationStore;

#[derive(Debug)]
struct InjectedFailure(String);

impl std::fmt::Display for InjectedFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InjectedFailure {}

/// In-memory store whose saves fail once a budget of successful saves is
/// used up, or on demand via [`FlakyStore::set_failing`].
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryConversationStore,
    /// Saves allowed before failing; `usize::MAX` when unlimited.
    allowed_saves: AtomicUsize,
    saves: AtomicUsize,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            allowed_saves: AtomicUsize::new(usize::MAX),
            ..Self::default()
        }
    }

    /// Lets `n` saves succeed, then fails every later one.
    pub fn failing_after(n: usize) -> Self {
        Self {
            allowed_saves: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    /// Switches every store operation to fail (or back).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Successful plus failed save attempts.
    pub fn save_attempts(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn injected(&self, op: &str) -> ParleyError {
        ParleyError::store(InjectedFailure(format!("injected {op} failure")))
    }

    fn check(&self, op: &str) -> Result<(), ParleyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(self.injected(op));
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for FlakyStore {
    fn name(&self) -> &str {
        "flaky"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Ok(HealthStatus::Unhealthy("failure injection active".into()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for FlakyStore {
    async fn save(&self, conversation: &Conversation) -> Result<Conversation, ParleyError> {
        let attempt = self.saves.fetch_add(1, Ordering::SeqCst);
        self.check("save")?;
        if attempt >= self.allowed_saves.load(Ordering::SeqCst) {
            return Err(self.injected("save"));
        }
        self.inner.save(conversation).await
    }

    async fn find_by_id(&self, id: &ConversationId) -> Result<Option<Conversation>, ParleyError> {
        self.check("find")?;
        self.inner.find_by_id(id).await
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Conversation>, ParleyError> {
        self.check("find")?;
        self.inner.find_by_user(user_id).await
    }

    async fn delete(&self, id: &ConversationId) -> Result<bool, ParleyError> {
        self.check("delete")?;
        self.inner.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::Message;

    #[tokio::test]
    async fn fails_after_budget() {
        let store = FlakyStore::failing_after(1);
        let mut conv = Conversation::new(UserId::from("u"));
        conv.push(Message::user("one").unwrap());
        let saved = store.save(&conv).await.unwrap();
        assert!(matches!(
            store.save(&saved).await,
            Err(ParleyError::Store { .. })
        ));
        assert_eq!(store.save_attempts(), 2);
    }

    #[tokio::test]
    async fn toggles_failure() {
        let store = FlakyStore::new();
        store.set_failing(true);
        assert!(store.find_by_user(&UserId::from("u")).await.is_err());
        store.set_failing(false);
        assert!(store.find_by_user(&UserId::from("u")).await.unwrap().is_empty());
    }
}
