//! JSON-file store: state survives across CLI invocations.
//!
//! Every mutation reads the file, applies the change and atomically replaces
//! it (write to a temp file, then rename). Writers within one process are
//! serialized; the session version check catches the rest.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use adaptest_core::model::{Item, ItemCatalog, LearnerProfile, ResponseEvent, Session};
use adaptest_core::traits::{ItemBank, LearnerStore, ResponseLog, SessionStore};

use crate::error::StoreError;
use crate::snapshot::StoreSnapshot;

pub struct JsonFileStore {
    path: PathBuf,
    items: Vec<Item>,
    index: HashMap<String, usize>,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, items: Vec<Item>) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id.clone(), i))
            .collect();
        Self {
            path: path.into(),
            items,
            index,
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_catalog(path: impl Into<PathBuf>, catalog: &ItemCatalog) -> Self {
        Self::new(path, catalog.items.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file contents; an absent file is an empty store.
    pub async fn read(&self) -> Result<StoreSnapshot, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreSnapshot::default())
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn write(&self, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let json = serde_json::to_vec_pretty(snapshot).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }

    /// Read-modify-write under the process-wide write lock.
    async fn update<T: Send>(
        &self,
        f: impl FnOnce(&mut StoreSnapshot) -> anyhow::Result<T> + Send,
    ) -> anyhow::Result<T> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.read().await?;
        let value = f(&mut snapshot)?;
        self.write(&snapshot).await?;
        Ok(value)
    }
}

#[async_trait]
impl ItemBank for JsonFileStore {
    async fn active_items(&self) -> anyhow::Result<Vec<Item>> {
        Ok(self.items.iter().filter(|i| i.active).cloned().collect())
    }

    async fn item(&self, item_id: &str) -> anyhow::Result<Option<Item>> {
        Ok(self.index.get(item_id).map(|&i| self.items[i].clone()))
    }
}

#[async_trait]
impl ResponseLog for JsonFileStore {
    async fn append(&self, event: &ResponseEvent) -> anyhow::Result<()> {
        let event = event.clone();
        self.update(move |s| {
            s.responses.push(event);
            Ok(())
        })
        .await
    }

    async fn history(&self, session_id: Uuid) -> anyhow::Result<Vec<ResponseEvent>> {
        Ok(self.read().await?.history(session_id))
    }

    async fn recent_for_learner(
        &self,
        learner_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ResponseEvent>> {
        Ok(self.read().await?.recent_for_learner(learner_id, limit))
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn create(&self, session: &Session) -> anyhow::Result<()> {
        self.update(|s| s.create_session(session)).await
    }

    async fn load(&self, session_id: Uuid) -> anyhow::Result<Option<Session>> {
        Ok(self.read().await?.sessions.remove(&session_id))
    }

    async fn save(&self, session: &Session, expected_version: u64) -> anyhow::Result<Session> {
        self.update(|s| s.save_session(session, expected_version))
            .await
    }

    async fn sessions_for(&self, learner_id: &str) -> anyhow::Result<Vec<Session>> {
        Ok(self.read().await?.sessions_for(learner_id))
    }
}

#[async_trait]
impl LearnerStore for JsonFileStore {
    async fn profile(&self, learner_id: &str) -> anyhow::Result<Option<LearnerProfile>> {
        Ok(self.read().await?.learners.remove(learner_id))
    }

    async fn set_ability(&self, learner_id: &str, ability: f64) -> anyhow::Result<LearnerProfile> {
        self.update(|s| Ok(s.set_ability(learner_id, ability)))
            .await
    }
}
