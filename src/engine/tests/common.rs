use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use crate::engine::domain::{
    CompetitionId, IncorrectSubmissionEntry, PersistentTaskRecord, Player, PlayerId, ScoreScope,
    Task, TaskId, TaskStatus,
};
use crate::engine::ledger::{LedgerError, MemoryLedger, SubmissionLedger};
use crate::engine::repository::{
    MemoryRecordRepository, RecomputeHook, RecomputeNotice, RecordRepository, RepositoryError,
};
use crate::engine::service::RankingService;
use crate::engine::tables::StaticTables;
use crate::engine::xp::{NoStreaks, StreakBonus, StreakProvider};

pub(super) fn ts(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).single().expect("valid ts")
}

pub(super) fn player(id: &str) -> Player {
    Player {
        id: PlayerId(id.to_string()),
        name: id.to_string(),
        avatar: format!("avatars/{id}.png"),
    }
}

pub(super) fn completed_task(id: &str, assignee: &str, due: i64, completed: i64) -> Task {
    Task {
        id: TaskId(id.to_string()),
        assignee_id: PlayerId(assignee.to_string()),
        status: TaskStatus::Completed,
        due_date: Some(ts(due)),
        completed_date: Some(ts(completed)),
        competition_id: None,
    }
}

pub(super) fn overdue_task(id: &str, assignee: &str, due: i64) -> Task {
    Task {
        id: TaskId(id.to_string()),
        assignee_id: PlayerId(assignee.to_string()),
        status: TaskStatus::Overdue,
        due_date: Some(ts(due)),
        completed_date: None,
        competition_id: None,
    }
}

pub(super) fn incorrect_entry(player_id: &str, at: i64) -> IncorrectSubmissionEntry {
    IncorrectSubmissionEntry {
        player_id: PlayerId(player_id.to_string()),
        task_id: None,
        competition_id: None,
        recorded_at: ts(at),
    }
}

/// Spec example: u1 on_time+early (950), u2 the same plus one overdue task
/// (950 but more incorrect signals), u3 a single on_time delivery (900).
pub(super) fn example_scenario() -> (Vec<Player>, Vec<Task>) {
    let players = vec![player("u-1"), player("u-2"), player("u-3")];
    let tasks = vec![
        completed_task("t-1", "u-1", 1_000, 1_000),
        completed_task("t-2", "u-1", 2_000, 1_500),
        completed_task("t-3", "u-2", 1_000, 1_000),
        completed_task("t-4", "u-2", 2_000, 1_500),
        overdue_task("t-5", "u-2", 2_000),
        completed_task("t-6", "u-3", 1_000, 1_000),
    ];
    (players, tasks)
}

pub(super) type MemoryService = RankingService<MemoryRecordRepository, MemoryLedger, NoStreaks>;

pub(super) fn build_service() -> (Arc<MemoryService>, Arc<MemoryRecordRepository>, Arc<MemoryLedger>)
{
    let repository = Arc::new(MemoryRecordRepository::default());
    let ledger = Arc::new(MemoryLedger::default());
    let tables = Arc::new(StaticTables::default());
    let service = Arc::new(RankingService::new(
        repository.clone(),
        ledger.clone(),
        Arc::new(NoStreaks),
        tables.clone(),
        tables,
    ));
    (service, repository, ledger)
}

pub(super) fn build_service_with_streaks(
    streaks: FixedStreaks,
) -> Arc<RankingService<MemoryRecordRepository, MemoryLedger, FixedStreaks>> {
    let tables = Arc::new(StaticTables::default());
    Arc::new(RankingService::new(
        Arc::new(MemoryRecordRepository::default()),
        Arc::new(MemoryLedger::default()),
        Arc::new(streaks),
        tables.clone(),
        tables,
    ))
}

#[derive(Default)]
pub(super) struct CountingHook {
    notices: Mutex<Vec<RecomputeNotice>>,
}

impl CountingHook {
    pub(super) fn notices(&self) -> Vec<RecomputeNotice> {
        self.notices.lock().expect("hook mutex poisoned").clone()
    }
}

impl RecomputeHook for CountingHook {
    fn recompute_completed(&self, notice: &RecomputeNotice) {
        self.notices
            .lock()
            .expect("hook mutex poisoned")
            .push(notice.clone());
    }
}

pub(super) struct UnavailableRepository;

impl RecordRepository for UnavailableRepository {
    fn upsert(&self, _records: &[PersistentTaskRecord]) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn load_by_scope(
        &self,
        _competition_id: Option<&CompetitionId>,
    ) -> Result<Vec<PersistentTaskRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) struct FailingLedger;

impl SubmissionLedger for FailingLedger {
    fn append(&self, _entry: IncorrectSubmissionEntry) -> Result<(), LedgerError> {
        Err(LedgerError::Unavailable("ledger offline".to_string()))
    }

    fn load_by_scope(
        &self,
        _scope: &ScoreScope,
    ) -> Result<Vec<IncorrectSubmissionEntry>, LedgerError> {
        Err(LedgerError::Unavailable("ledger offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct FixedStreaks {
    pub(super) bonuses: BTreeMap<PlayerId, StreakBonus>,
}

impl StreakProvider for FixedStreaks {
    fn streak_for(&self, player_id: &PlayerId) -> Option<StreakBonus> {
        self.bonuses.get(player_id).copied()
    }
}
