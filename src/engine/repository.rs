use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::domain::{CompetitionId, PersistentTaskRecord, PlayerId, TaskId};

/// Storage abstraction over the canonical task records so the engine never
/// assumes a particular storage technology.
pub trait RecordRepository: Send + Sync {
    /// Insert or replace records keyed by task id (last write wins).
    fn upsert(&self, records: &[PersistentTaskRecord]) -> Result<(), RepositoryError>;
    /// Load every record in a competition scope (`None` = global scope).
    fn load_by_scope(
        &self,
        competition_id: Option<&CompetitionId>,
    ) -> Result<Vec<PersistentTaskRecord>, RepositoryError>;
}

/// Error enumeration for repository failures. Read failures surface to the
/// caller; write failures are the caller's retry responsibility.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Notification payload delivered to subscribers after a recompute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecomputeNotice {
    pub player_id: PlayerId,
    #[serde(default)]
    pub competition_id: Option<CompetitionId>,
    pub xp: u32,
    pub level: u32,
}

/// Subscriber hook invoked exactly once per triggered recompute. No ordering
/// guarantee holds relative to other players' recomputes.
pub trait RecomputeHook: Send + Sync {
    fn recompute_completed(&self, notice: &RecomputeNotice);
}

/// In-memory repository backend for tests and the demo binary; production
/// deployments plug a durable store behind the same trait.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordRepository {
    records: Arc<Mutex<BTreeMap<TaskId, PersistentTaskRecord>>>,
}

impl MemoryRecordRepository {
    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<TaskId, PersistentTaskRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn records(&self) -> Vec<PersistentTaskRecord> {
        self.lock().values().cloned().collect()
    }
}

impl RecordRepository for MemoryRecordRepository {
    fn upsert(&self, records: &[PersistentTaskRecord]) -> Result<(), RepositoryError> {
        let mut guard = self.lock();
        for record in records {
            guard.insert(record.task_id.clone(), record.clone());
        }
        Ok(())
    }

    fn load_by_scope(
        &self,
        competition_id: Option<&CompetitionId>,
    ) -> Result<Vec<PersistentTaskRecord>, RepositoryError> {
        Ok(self
            .lock()
            .values()
            .filter(|record| match competition_id {
                Some(scoped) => record.competition_id.as_ref() == Some(scoped),
                None => true,
            })
            .cloned()
            .collect())
    }
}
