//! Storage state shared by every backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use adaptest_core::error::CatError;
use adaptest_core::model::{LearnerProfile, ResponseEvent, Session};

use crate::error::StoreError;

/// Mutable store contents: sessions, the response log and learner profiles.
///
/// Items are calibration data and live outside the snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub sessions: BTreeMap<Uuid, Session>,
    #[serde(default)]
    pub responses: Vec<ResponseEvent>,
    #[serde(default)]
    pub learners: BTreeMap<String, LearnerProfile>,
}

impl StoreSnapshot {
    pub fn create_session(&mut self, session: &Session) -> anyhow::Result<()> {
        if self.sessions.contains_key(&session.id) {
            return Err(StoreError::DuplicateSession(session.id).into());
        }
        self.sessions.insert(session.id, session.clone());
        Ok(())
    }

    /// Compare-and-swap on the session version.
    pub fn save_session(&mut self, session: &Session, expected_version: u64) -> anyhow::Result<Session> {
        let Some(stored) = self.sessions.get_mut(&session.id) else {
            return Err(CatError::SessionNotFound(session.id).into());
        };

        if stored.version != expected_version {
            tracing::warn!(
                session = %session.id,
                expected = expected_version,
                found = stored.version,
                "stale session version"
            );
            return Err(CatError::VersionConflict {
                session_id: session.id,
                expected: expected_version,
                found: stored.version,
            }
            .into());
        }

        let mut updated = session.clone();
        updated.version = expected_version + 1;
        *stored = updated.clone();
        Ok(updated)
    }

    pub fn history(&self, session_id: Uuid) -> Vec<ResponseEvent> {
        self.responses
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn recent_for_learner(&self, learner_id: &str, limit: usize) -> Vec<ResponseEvent> {
        let mine: Vec<&ResponseEvent> = self
            .responses
            .iter()
            .filter(|r| r.learner_id == learner_id)
            .collect();
        let skip = mine.len().saturating_sub(limit);
        mine.into_iter().skip(skip).cloned().collect()
    }

    pub fn sessions_for(&self, learner_id: &str) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .values()
            .filter(|s| s.learner_id == learner_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        sessions
    }

    pub fn set_ability(&mut self, learner_id: &str, ability: f64) -> LearnerProfile {
        let profile = LearnerProfile::new(learner_id, ability);
        self.learners.insert(learner_id.to_string(), profile.clone());
        profile
    }
}
