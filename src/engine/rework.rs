use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Task, TaskStatus};

/// Result of applying a rework transition to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReworkTransition {
    /// The task state changed and the superseding record must be persisted.
    Applied,
    /// `enter_rework` on a task already in rework; nothing changed.
    AlreadyInRework,
    /// `reconclude` on a task that is not in rework; rejected without
    /// fabricating a rework episode.
    NotInRework,
}

impl ReworkTransition {
    pub const fn changed(self) -> bool {
        matches!(self, ReworkTransition::Applied)
    }
}

/// Caller options for re-concluding a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcludeOptions {
    #[serde(default)]
    pub allow_due_date_recalc: bool,
    #[serde(default)]
    pub new_due_date: Option<DateTime<Utc>>,
}

/// Withdraw a task for correction. Idempotent: a task already in rework is
/// left untouched. The first application clears `completed_date`, making the
/// task ineligible for aggregation immediately.
pub fn enter_rework(task: &mut Task) -> ReworkTransition {
    if task.status == TaskStatus::Rework {
        return ReworkTransition::AlreadyInRework;
    }

    task.status = TaskStatus::Rework;
    task.completed_date = None;
    ReworkTransition::Applied
}

/// Complete a rework episode. The task re-enters the aggregation denominator
/// with the new due/completed pair. The due date is rewritten only when the
/// caller both allows the recalculation and supplies a new date.
pub fn reconclude(
    task: &mut Task,
    new_completed_date: DateTime<Utc>,
    options: &ReconcludeOptions,
) -> ReworkTransition {
    if task.status != TaskStatus::Rework {
        return ReworkTransition::NotInRework;
    }

    task.status = TaskStatus::Completed;
    task.completed_date = Some(new_completed_date);
    if options.allow_due_date_recalc {
        if let Some(new_due) = options.new_due_date {
            task.due_date = Some(new_due);
        }
    }

    ReworkTransition::Applied
}
