//! In-memory store for tests, simulations and single-process use.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use adaptest_core::model::{Item, ItemCatalog, LearnerProfile, ResponseEvent, Session};
use adaptest_core::traits::{ItemBank, LearnerStore, ResponseLog, SessionStore};

use crate::snapshot::StoreSnapshot;

/// Keeps items and all mutable state in process memory.
pub struct InMemoryStore {
    items: Vec<Item>,
    index: HashMap<String, usize>,
    state: RwLock<StoreSnapshot>,
}

impl InMemoryStore {
    pub fn new(items: Vec<Item>) -> Self {
        Self::with_snapshot(items, StoreSnapshot::default())
    }

    pub fn from_catalog(catalog: &ItemCatalog) -> Self {
        Self::new(catalog.items.clone())
    }

    pub fn with_snapshot(items: Vec<Item>, snapshot: StoreSnapshot) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id.clone(), i))
            .collect();
        Self {
            items,
            index,
            state: RwLock::new(snapshot),
        }
    }

    /// Copy of the current mutable state.
    pub async fn snapshot(&self) -> StoreSnapshot {
        self.state.read().await.clone()
    }
}

#[async_trait]
impl ItemBank for InMemoryStore {
    async fn active_items(&self) -> anyhow::Result<Vec<Item>> {
        Ok(self.items.iter().filter(|i| i.active).cloned().collect())
    }

    async fn item(&self, item_id: &str) -> anyhow::Result<Option<Item>> {
        Ok(self.index.get(item_id).map(|&i| self.items[i].clone()))
    }
}

#[async_trait]
impl ResponseLog for InMemoryStore {
    async fn append(&self, event: &ResponseEvent) -> anyhow::Result<()> {
        self.state.write().await.responses.push(event.clone());
        Ok(())
    }

    async fn history(&self, session_id: Uuid) -> anyhow::Result<Vec<ResponseEvent>> {
        Ok(self.state.read().await.history(session_id))
    }

    async fn recent_for_learner(
        &self,
        learner_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ResponseEvent>> {
        Ok(self.state.read().await.recent_for_learner(learner_id, limit))
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn create(&self, session: &Session) -> anyhow::Result<()> {
        self.state.write().await.create_session(session)
    }

    async fn load(&self, session_id: Uuid) -> anyhow::Result<Option<Session>> {
        Ok(self.state.read().await.sessions.get(&session_id).cloned())
    }

    async fn save(&self, session: &Session, expected_version: u64) -> anyhow::Result<Session> {
        self.state
            .write()
            .await
            .save_session(session, expected_version)
    }

    async fn sessions_for(&self, learner_id: &str) -> anyhow::Result<Vec<Session>> {
        Ok(self.state.read().await.sessions_for(learner_id))
    }
}

#[async_trait]
impl LearnerStore for InMemoryStore {
    async fn profile(&self, learner_id: &str) -> anyhow::Result<Option<LearnerProfile>> {
        Ok(self.state.read().await.learners.get(learner_id).cloned())
    }

    async fn set_ability(&self, learner_id: &str, ability: f64) -> anyhow::Result<LearnerProfile> {
        Ok(self.state.write().await.set_ability(learner_id, ability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptest_core::error::CatError;
    use adaptest_core::model::{ItemParams, SessionKind};

    fn store() -> InMemoryStore {
        let mut retired = Item::new("old", "Grammar", ItemParams::default());
        retired.active = false;
        InMemoryStore::new(vec![
            Item::new("s1", "Spelling", ItemParams::default()),
            retired,
        ])
    }

    #[tokio::test]
    async fn inactive_items_are_hidden_but_resolvable() {
        let store = store();
        let active = store.active_items().await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(store.item("old").await.unwrap().is_some());
        assert!(store.item("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_writer_gets_version_conflict() {
        let store = store();
        let session = Session::new("l1", SessionKind::PreAssessment, 0.0);
        store.create(&session).await.unwrap();

        let first = store.load(session.id).await.unwrap().unwrap();
        let second = store.load(session.id).await.unwrap().unwrap();

        store.save(&first, first.version).await.unwrap();
        let err: CatError = store
            .save(&second, second.version)
            .await
            .unwrap_err()
            .into();
        assert!(err.is_retryable());
        assert!(matches!(err, CatError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn learner_profiles_roundtrip() {
        let store = store();
        assert!(store.profile("l1").await.unwrap().is_none());
        store.set_ability("l1", 1.25).await.unwrap();
        let profile = store.profile("l1").await.unwrap().unwrap();
        assert_eq!(profile.current_ability, 1.25);
    }
}
