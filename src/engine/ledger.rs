use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::warn;

use super::domain::{IncorrectSubmissionEntry, Player, PlayerId, ScoreScope, Task, TaskStatus};

/// Ledger access failure.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Append-only store of submissions judged incorrect, read back as a
/// tie-break signal for the ranking.
pub trait SubmissionLedger: Send + Sync {
    fn append(&self, entry: IncorrectSubmissionEntry) -> Result<(), LedgerError>;
    fn load_by_scope(
        &self,
        scope: &ScoreScope,
    ) -> Result<Vec<IncorrectSubmissionEntry>, LedgerError>;
}

/// Which signal backed the incorrect counts of a ranking run. The source is
/// uniform across the whole computation; ledger counts and heuristic counts
/// are never mixed within one ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IncorrectSource {
    Ledger,
    OverdueHeuristic,
}

/// Resolve per-player incorrect counts for a ranking run. An empty or
/// unavailable ledger degrades to counting overdue tasks per player, applied
/// to every player in the run.
pub fn resolve_incorrect_counts(
    ledger: &dyn SubmissionLedger,
    players: &[Player],
    tasks: &[Task],
    scope: &ScoreScope,
) -> (BTreeMap<PlayerId, u32>, IncorrectSource) {
    let mut counts: BTreeMap<PlayerId, u32> = players
        .iter()
        .map(|player| (player.id.clone(), 0))
        .collect();

    match ledger.load_by_scope(scope) {
        Ok(entries) if !entries.is_empty() => {
            for entry in entries {
                if let Some(count) = counts.get_mut(&entry.player_id) {
                    *count += 1;
                }
            }
            (counts, IncorrectSource::Ledger)
        }
        Ok(_) => overdue_heuristic(counts, tasks, scope),
        Err(error) => {
            warn!(%error, "ledger unavailable, ranking falls back to overdue heuristic");
            overdue_heuristic(counts, tasks, scope)
        }
    }
}

fn overdue_heuristic(
    mut counts: BTreeMap<PlayerId, u32>,
    tasks: &[Task],
    scope: &ScoreScope,
) -> (BTreeMap<PlayerId, u32>, IncorrectSource) {
    for task in tasks {
        if task.status != TaskStatus::Overdue || !scope.admits_task(task) {
            continue;
        }
        if let Some(count) = counts.get_mut(&task.assignee_id) {
            *count += 1;
        }
    }
    (counts, IncorrectSource::OverdueHeuristic)
}

/// In-memory ledger backend. Tests and the demo binary use it directly;
/// production deployments plug a durable store behind the same trait.
#[derive(Debug, Default, Clone)]
pub struct MemoryLedger {
    entries: Arc<Mutex<Vec<IncorrectSubmissionEntry>>>,
}

impl MemoryLedger {
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<IncorrectSubmissionEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SubmissionLedger for MemoryLedger {
    fn append(&self, entry: IncorrectSubmissionEntry) -> Result<(), LedgerError> {
        self.lock().push(entry);
        Ok(())
    }

    fn load_by_scope(
        &self,
        scope: &ScoreScope,
    ) -> Result<Vec<IncorrectSubmissionEntry>, LedgerError> {
        Ok(self
            .lock()
            .iter()
            .filter(|entry| scope.admits_competition(entry.competition_id.as_ref()))
            .cloned()
            .collect())
    }
}
