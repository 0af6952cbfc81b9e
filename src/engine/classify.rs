use std::cmp::Ordering;

use super::domain::{DeliveryClassification, Task, TaskStatus};

/// Classify a single delivery. Pure and total: malformed or missing
/// timestamps fall back to `OnTime` instead of erroring, so the aggregation
/// pipeline never sees a classification failure.
pub fn classify(task: &Task) -> DeliveryClassification {
    match task.status {
        TaskStatus::Rework => DeliveryClassification::Rework,
        TaskStatus::Pending | TaskStatus::Overdue => DeliveryClassification::Ignore,
        TaskStatus::Completed => match (task.due_date, task.completed_date) {
            (Some(due), Some(completed)) => match completed.cmp(&due) {
                Ordering::Less => DeliveryClassification::Early,
                Ordering::Equal => DeliveryClassification::OnTime,
                Ordering::Greater => DeliveryClassification::Late,
            },
            // Cannot compare timestamps; treat the delivery as punctual.
            _ => DeliveryClassification::OnTime,
        },
    }
}
