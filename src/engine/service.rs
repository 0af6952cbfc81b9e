use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::aggregate::{aggregate_records, aggregate_tasks};
use super::backfill::record_for_task;
use super::domain::{
    CompetitionId, Player, PlayerAggregate, PlayerId, ScoreScope, ScoreWindow, Task, TaskId,
};
use super::ledger::{resolve_incorrect_counts, LedgerError, SubmissionLedger};
use super::ranking::{first_completion, rank_players, RankingCandidate};
use super::repository::{RecomputeHook, RecomputeNotice, RecordRepository, RepositoryError};
use super::rework::{self, ReconcludeOptions, ReworkTransition};
use super::tables::{load_level_rules, LevelRuleProvider, PercentageProvider};
use super::views::{PlayerProfile, ProductivityView, RankingEntry};
use super::xp::{resolve_level, xp_from_average, StreakBonus, StreakProvider};

type WriteKey = (PlayerId, Option<CompetitionId>);

/// Facade over the ranking pipeline: classification, aggregation, XP/level
/// conversion, ordering, the rework lifecycle, and recompute notifications.
/// All collaborators are injected; the engine itself performs no I/O beyond
/// the repository, ledger, and table providers it is handed.
pub struct RankingService<R, L, S> {
    repository: Arc<R>,
    ledger: Arc<L>,
    streaks: Arc<S>,
    percentages: Arc<dyn PercentageProvider>,
    levels: Arc<dyn LevelRuleProvider>,
    hooks: Mutex<Vec<Arc<dyn RecomputeHook>>>,
    write_locks: Mutex<HashMap<WriteKey, Arc<Mutex<()>>>>,
}

impl<R, L, S> RankingService<R, L, S>
where
    R: RecordRepository + 'static,
    L: SubmissionLedger + 'static,
    S: StreakProvider + 'static,
{
    pub fn new(
        repository: Arc<R>,
        ledger: Arc<L>,
        streaks: Arc<S>,
        percentages: Arc<dyn PercentageProvider>,
        levels: Arc<dyn LevelRuleProvider>,
    ) -> Self {
        Self {
            repository,
            ledger,
            streaks,
            percentages,
            levels,
            hooks: Mutex::new(Vec::new()),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Register a subscriber for recompute-completed notifications. Each
    /// hook is invoked exactly once per triggered recompute.
    pub fn register_hook(&self, hook: Arc<dyn RecomputeHook>) {
        lock_recovering(&self.hooks).push(hook);
    }

    /// Compute the ordered ranking over an immutable snapshot of players and
    /// tasks. Every failure mode in this path is locally recoverable (table
    /// fallback, ledger heuristic), so the computation itself cannot fail.
    pub fn compute_ranking(
        &self,
        players: &[Player],
        tasks: &[Task],
        scope: &ScoreScope,
        now: DateTime<Utc>,
    ) -> Vec<RankingEntry> {
        let (incorrect_counts, source) =
            resolve_incorrect_counts(self.ledger.as_ref(), players, tasks, scope);
        let rules = load_level_rules(self.levels.as_ref());

        let weekly_scope = ScoreScope {
            competition_id: scope.competition_id.clone(),
            window: ScoreWindow::weekly(now),
        };
        let monthly_scope = ScoreScope {
            competition_id: scope.competition_id.clone(),
            window: ScoreWindow::monthly(now),
        };

        let candidates = players
            .iter()
            .map(|player| {
                let player_tasks: Vec<&Task> = tasks
                    .iter()
                    .filter(|task| task.assignee_id == player.id)
                    .collect();
                let bonus = self.streaks.streak_for(&player.id).unwrap_or_default();

                let productivity =
                    aggregate_tasks(player_tasks.iter().copied(), scope, self.percentages.as_ref());
                let xp = xp_from_average(productivity.summary.average_percent_raw)
                    + bonus.xp_for_window(&scope.window);

                RankingCandidate {
                    player: player.clone(),
                    xp,
                    level: resolve_level(xp, &rules),
                    incorrect_count: incorrect_counts.get(&player.id).copied().unwrap_or(0),
                    first_completion: first_completion(player_tasks.iter().copied(), scope),
                    weekly_xp: self.scoped_xp(&player_tasks, &weekly_scope, &bonus),
                    monthly_xp: self.scoped_xp(&player_tasks, &monthly_scope, &bonus),
                    missions_completed: productivity.summary.total_considered,
                    consistency_bonus: bonus.consistency_bonus,
                    streak: bonus.streak_days,
                }
            })
            .collect();

        let ranked = rank_players(candidates);
        info!(
            players = ranked.len(),
            incorrect_source = ?source,
            "ranking computed"
        );

        ranked.into_iter().map(RankingEntry::from).collect()
    }

    /// Own-profile projection, including the productivity breakdown the
    /// ranking rows hide.
    pub fn compute_profile(&self, player: &Player, tasks: &[Task]) -> PlayerProfile {
        let player_tasks = tasks.iter().filter(|task| task.assignee_id == player.id);
        let productivity =
            aggregate_tasks(player_tasks, &ScoreScope::all_time(), self.percentages.as_ref());

        PlayerProfile {
            id: player.id.clone(),
            name: player.name.clone(),
            productivity: ProductivityView {
                total_considered: productivity.summary.total_considered,
                average_percent: productivity.summary.average_percent_raw,
            },
            delivery_distribution: productivity.distribution,
        }
    }

    /// Withdraw a task for correction and recompute its player. Idempotent:
    /// a task already in rework is reported as such with no recompute.
    pub fn enter_rework(
        &self,
        tasks: &mut [Task],
        task_id: &TaskId,
    ) -> Result<ReworkTransition, ServiceError> {
        let task = find_task(tasks, task_id)?;
        let transition = rework::enter_rework(task);
        if transition.changed() {
            let task = task.clone();
            self.persist_and_recompute(&task)?;
        }
        Ok(transition)
    }

    /// Complete a rework episode and recompute its player. A task not in
    /// rework is rejected as `NotInRework` without touching any state.
    pub fn reconclude(
        &self,
        tasks: &mut [Task],
        task_id: &TaskId,
        new_completed_date: DateTime<Utc>,
        options: &ReconcludeOptions,
    ) -> Result<ReworkTransition, ServiceError> {
        let task = find_task(tasks, task_id)?;
        let transition = rework::reconclude(task, new_completed_date, options);
        if transition.changed() {
            let task = task.clone();
            self.persist_and_recompute(&task)?;
        }
        Ok(transition)
    }

    /// Incremental upsert for a single task-change event: supersede the
    /// task's canonical record and recompute the affected player from the
    /// full record set.
    pub fn ingest_task(&self, task: &Task) -> Result<PlayerAggregate, ServiceError> {
        self.persist_and_recompute(task)
    }

    /// Authoritative aggregate for one player, derived from the repository.
    /// Repository read failures surface to the caller; aggregates are never
    /// fabricated.
    pub fn player_aggregate(
        &self,
        player_id: &PlayerId,
        competition_id: Option<&CompetitionId>,
    ) -> Result<PlayerAggregate, ServiceError> {
        self.derive_aggregate(player_id, competition_id)
    }

    fn scoped_xp(&self, tasks: &[&Task], scope: &ScoreScope, bonus: &StreakBonus) -> u32 {
        let productivity =
            aggregate_tasks(tasks.iter().copied(), scope, self.percentages.as_ref());
        xp_from_average(productivity.summary.average_percent_raw)
            + bonus.xp_for_window(&scope.window)
    }

    /// Serialize writes per (player, competition): last write wins, no torn
    /// updates. Recomputes for different players proceed independently.
    fn persist_and_recompute(&self, task: &Task) -> Result<PlayerAggregate, ServiceError> {
        let key = (task.assignee_id.clone(), task.competition_id.clone());
        let per_key = self.write_lock(key);
        let _held = per_key.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let record = record_for_task(task, None, self.percentages.as_ref());
        self.repository.upsert(std::slice::from_ref(&record))?;

        let aggregate =
            self.derive_aggregate(&task.assignee_id, task.competition_id.as_ref())?;
        self.notify_recompute(&aggregate);
        Ok(aggregate)
    }

    fn derive_aggregate(
        &self,
        player_id: &PlayerId,
        competition_id: Option<&CompetitionId>,
    ) -> Result<PlayerAggregate, ServiceError> {
        let records: Vec<_> = self
            .repository
            .load_by_scope(competition_id)?
            .into_iter()
            .filter(|record| &record.player_id == player_id)
            .collect();
        let summary = aggregate_records(&records);

        Ok(PlayerAggregate {
            player_id: player_id.clone(),
            competition_id: competition_id.cloned(),
            sum_percent: summary.sum_percent,
            count_considered: summary.total_considered,
            average_percent: summary.average_percent_raw,
            xp: xp_from_average(summary.average_percent_raw),
            incorrect_count: self.ledger_count(player_id, competition_id),
        })
    }

    fn ledger_count(&self, player_id: &PlayerId, competition_id: Option<&CompetitionId>) -> u32 {
        let scope = ScoreScope {
            competition_id: competition_id.cloned(),
            window: ScoreWindow::AllTime,
        };
        match self.ledger.load_by_scope(&scope) {
            Ok(entries) => entries
                .iter()
                .filter(|entry| &entry.player_id == player_id)
                .count() as u32,
            Err(error) => {
                warn!(%error, player = %player_id, "ledger unavailable during recompute");
                0
            }
        }
    }

    fn notify_recompute(&self, aggregate: &PlayerAggregate) {
        let rules = load_level_rules(self.levels.as_ref());
        let notice = RecomputeNotice {
            player_id: aggregate.player_id.clone(),
            competition_id: aggregate.competition_id.clone(),
            xp: aggregate.xp,
            level: resolve_level(aggregate.xp, &rules),
        };

        let hooks: Vec<Arc<dyn RecomputeHook>> = lock_recovering(&self.hooks).clone();
        for hook in hooks {
            hook.recompute_completed(&notice);
        }
        info!(player = %notice.player_id, xp = notice.xp, level = notice.level, "recompute completed");
    }

    fn write_lock(&self, key: WriteKey) -> Arc<Mutex<()>> {
        lock_recovering(&self.write_locks)
            .entry(key)
            .or_default()
            .clone()
    }
}

fn find_task<'a>(tasks: &'a mut [Task], task_id: &TaskId) -> Result<&'a mut Task, ServiceError> {
    tasks
        .iter_mut()
        .find(|task| &task.id == task_id)
        .ok_or_else(|| ServiceError::UnknownTask(task_id.clone()))
}

fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Error raised by the ranking service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("unknown task {0}")]
    UnknownTask(TaskId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
