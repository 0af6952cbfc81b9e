use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

use super::classify::classify;
use super::domain::{
    CompetitionId, DeliveryClassification, PersistentTaskRecord, PlayerId, Task, TaskId,
    TaskStatus,
};
use super::tables::{lookup_percentage, PercentageProvider};

/// Canonical record for one task at classification time. Deterministic: the
/// same task and percent table always produce the same record, which is what
/// makes the batch backfill idempotent.
pub fn record_for_task(
    task: &Task,
    competition_id: Option<&CompetitionId>,
    percentages: &dyn PercentageProvider,
) -> PersistentTaskRecord {
    let classification = classify(task);
    let percent = if classification == DeliveryClassification::Ignore {
        0
    } else {
        lookup_percentage(percentages, classification)
    };

    PersistentTaskRecord {
        task_id: task.id.clone(),
        player_id: task.assignee_id.clone(),
        competition_id: task
            .competition_id
            .clone()
            .or_else(|| competition_id.cloned()),
        due_date: task.due_date,
        completed_date: task.completed_date,
        in_rework: task.status == TaskStatus::Rework,
        classification,
        percent,
    }
}

/// Convert a batch of raw tasks into canonical records, keyed by task id.
/// Duplicate task ids keep the last occurrence; output is ordered by task id
/// so reruns over identical input yield identical record sets.
pub fn backfill_records(
    tasks: &[Task],
    competition_id: Option<&CompetitionId>,
    percentages: &dyn PercentageProvider,
) -> Vec<PersistentTaskRecord> {
    let mut by_task: BTreeMap<TaskId, PersistentTaskRecord> = BTreeMap::new();
    for task in tasks {
        by_task.insert(
            task.id.clone(),
            record_for_task(task, competition_id, percentages),
        );
    }
    by_task.into_values().collect()
}

/// Error raised while importing an exported task sheet.
#[derive(Debug, thiserror::Error)]
pub enum TaskImportError {
    #[error("failed to read task export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid task CSV data: {0}")]
    Csv(#[from] csv::Error),
}

/// Importer for task sheets exported from the upstream task system,
/// feeding historical deliveries into the backfill.
pub struct CsvTaskImporter;

impl CsvTaskImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Task>, TaskImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<Task>, TaskImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut tasks = Vec::new();

        for record in csv_reader.deserialize::<TaskRow>() {
            let row = record?;
            tasks.push(row.into_task());
        }

        Ok(tasks)
    }
}

#[derive(Debug, Deserialize)]
struct TaskRow {
    #[serde(rename = "Task ID")]
    task_id: String,
    #[serde(rename = "Assignee")]
    assignee: String,
    #[serde(rename = "Status", default, deserialize_with = "empty_string_as_none")]
    status: Option<String>,
    #[serde(rename = "Due Date", default, deserialize_with = "empty_string_as_none")]
    due_date: Option<String>,
    #[serde(
        rename = "Completed At",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    completed_at: Option<String>,
    #[serde(
        rename = "Competition",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    competition: Option<String>,
}

impl TaskRow {
    fn into_task(self) -> Task {
        Task {
            id: TaskId(self.task_id),
            assignee_id: PlayerId(self.assignee),
            status: parse_status(self.status.as_deref()),
            due_date: self.due_date.as_deref().and_then(parse_datetime),
            completed_date: self.completed_at.as_deref().and_then(parse_datetime),
            competition_id: self.competition.map(CompetitionId),
        }
    }
}

/// Unknown status strings land as `Pending` so a dirty export degrades to
/// ignored deliveries rather than aborting the import.
fn parse_status(value: Option<&str>) -> TaskStatus {
    match value.map(|status| status.trim().to_ascii_lowercase()).as_deref() {
        Some("completed") | Some("done") => TaskStatus::Completed,
        Some("overdue") => TaskStatus::Overdue,
        Some("refacao") | Some("refação") | Some("rework") => TaskStatus::Rework,
        _ => TaskStatus::Pending,
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// Lenient timestamp parsing: RFC 3339 first, then bare dates at midnight.
/// Anything else is a malformed timestamp and lands as `None`, which the
/// classifier resolves with its on-time fallback.
fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    None
}

#[cfg(test)]
pub(crate) fn parse_datetime_for_tests(value: &str) -> Option<DateTime<Utc>> {
    parse_datetime(value)
}
