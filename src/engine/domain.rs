use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier wrapper for players competing in a ranking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for tasks owned by the upstream task system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Optional scoping key separating rankings per competition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompetitionId(pub String);

/// Lifecycle status of a task as reported by the upstream task system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Overdue,
    Pending,
    /// A completed task withdrawn for correction ("refação"); excluded from
    /// scoring until reconcluded.
    #[serde(rename = "refacao")]
    Rework,
}

/// A unit of work as delivered by the upstream task system. The engine reads
/// every field and rewrites only `status`/`completed_date` during rework.
/// Malformed upstream timestamps arrive as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub assignee_id: PlayerId,
    pub status: TaskStatus,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub competition_id: Option<CompetitionId>,
}

/// Derived classification of one delivery; never stored apart from its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryClassification {
    Early,
    OnTime,
    Late,
    #[serde(rename = "refacao")]
    Rework,
    Ignore,
}

impl DeliveryClassification {
    pub const fn label(self) -> &'static str {
        match self {
            DeliveryClassification::Early => "early",
            DeliveryClassification::OnTime => "on_time",
            DeliveryClassification::Late => "late",
            DeliveryClassification::Rework => "refacao",
            DeliveryClassification::Ignore => "ignore",
        }
    }
}

/// Canonical, engine-owned projection of a task at classification time.
/// Superseded whenever the source task changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentTaskRecord {
    pub task_id: TaskId,
    pub player_id: PlayerId,
    #[serde(default)]
    pub competition_id: Option<CompetitionId>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_date: Option<DateTime<Utc>>,
    pub in_rework: bool,
    pub classification: DeliveryClassification,
    /// Clamped to 0-100 at record creation.
    pub percent: u8,
}

impl PersistentTaskRecord {
    /// Denominator-exclusion rule: rework-pending tasks, ignored deliveries,
    /// and tasks without a completion timestamp never count.
    pub fn considered(&self) -> bool {
        !self.in_rework
            && self.completed_date.is_some()
            && self.classification != DeliveryClassification::Ignore
    }
}

/// Derived per-player aggregate; always a pure function of the record set
/// plus the ledger, never hand-edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAggregate {
    pub player_id: PlayerId,
    #[serde(default)]
    pub competition_id: Option<CompetitionId>,
    pub sum_percent: u64,
    pub count_considered: u32,
    pub average_percent: f64,
    pub xp: u32,
    pub incorrect_count: u32,
}

/// Append-only ledger record of a submission judged incorrect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncorrectSubmissionEntry {
    pub player_id: PlayerId,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub competition_id: Option<CompetitionId>,
    pub recorded_at: DateTime<Utc>,
}

/// Display identity consumed by the outward projections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub avatar: String,
}

/// Time window a computation considers; filters on `completed_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "since")]
pub enum ScoreWindow {
    AllTime,
    Weekly(DateTime<Utc>),
    Monthly(DateTime<Utc>),
}

impl ScoreWindow {
    /// Rolling seven-day window ending at `now`.
    pub fn weekly(now: DateTime<Utc>) -> Self {
        ScoreWindow::Weekly(now - Duration::days(7))
    }

    /// Rolling thirty-day window ending at `now`.
    pub fn monthly(now: DateTime<Utc>) -> Self {
        ScoreWindow::Monthly(now - Duration::days(30))
    }

    pub fn includes(&self, completed: DateTime<Utc>) -> bool {
        match self {
            ScoreWindow::AllTime => true,
            ScoreWindow::Weekly(since) | ScoreWindow::Monthly(since) => completed >= *since,
        }
    }
}

impl Default for ScoreWindow {
    fn default() -> Self {
        ScoreWindow::AllTime
    }
}

/// Scope of one ranking or aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreScope {
    #[serde(default)]
    pub competition_id: Option<CompetitionId>,
    #[serde(default)]
    pub window: ScoreWindow,
}

impl ScoreScope {
    pub fn all_time() -> Self {
        Self::default()
    }

    /// Competition filter: an unscoped run admits every task.
    pub fn admits_competition(&self, competition: Option<&CompetitionId>) -> bool {
        match &self.competition_id {
            Some(scoped) => competition == Some(scoped),
            None => true,
        }
    }

    pub fn admits_task(&self, task: &Task) -> bool {
        self.admits_competition(task.competition_id.as_ref())
    }
}
