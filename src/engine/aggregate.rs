use serde::Serialize;

use super::classify::classify;
use super::domain::{DeliveryClassification, PersistentTaskRecord, ScoreScope, Task};
use super::tables::{lookup_percentage, PercentageProvider};

/// Folded productivity figures for one player within a scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProductivitySummary {
    pub total_considered: u32,
    pub sum_percent: u64,
    pub average_percent_raw: f64,
}

/// Counts per delivery classification, used by the profile projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryDistribution {
    pub early: u32,
    pub on_time: u32,
    pub late: u32,
    pub rework: u32,
}

impl DeliveryDistribution {
    fn record(&mut self, classification: DeliveryClassification) {
        match classification {
            DeliveryClassification::Early => self.early += 1,
            DeliveryClassification::OnTime => self.on_time += 1,
            DeliveryClassification::Late => self.late += 1,
            DeliveryClassification::Rework => self.rework += 1,
            DeliveryClassification::Ignore => {}
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerProductivity {
    pub summary: ProductivitySummary,
    pub distribution: DeliveryDistribution,
}

/// Fold one player's tasks into sum/count/average percent. Ignored
/// deliveries, rework-pending tasks, and tasks without a completion
/// timestamp are excluded from the denominator. A player with no considered
/// tasks averages 0 (never a division by zero).
pub fn aggregate_tasks<'a>(
    tasks: impl IntoIterator<Item = &'a Task>,
    scope: &ScoreScope,
    percentages: &dyn PercentageProvider,
) -> PlayerProductivity {
    let mut summary = ProductivitySummary::default();
    let mut distribution = DeliveryDistribution::default();

    for task in tasks {
        if !scope.admits_task(task) {
            continue;
        }
        // Completions outside the window are invisible to the scope, in the
        // distribution as much as in the denominator. Tasks without a
        // completion timestamp have nothing to window on.
        if let Some(completed) = task.completed_date {
            if !scope.window.includes(completed) {
                continue;
            }
        }

        let classification = classify(task);
        distribution.record(classification);

        if matches!(
            classification,
            DeliveryClassification::Ignore | DeliveryClassification::Rework
        ) {
            continue;
        }
        if task.completed_date.is_none() {
            continue;
        }

        summary.sum_percent += lookup_percentage(percentages, classification) as u64;
        summary.total_considered += 1;
    }

    summary.average_percent_raw = if summary.total_considered == 0 {
        0.0
    } else {
        summary.sum_percent as f64 / summary.total_considered as f64
    };

    PlayerProductivity {
        summary,
        distribution,
    }
}

/// Re-derive the considered sum/count/average from canonical records. The
/// aggregate is always recomputable from the full record set; nothing
/// incremental is kept that could drift from this fold.
pub fn aggregate_records(records: &[PersistentTaskRecord]) -> ProductivitySummary {
    let mut summary = ProductivitySummary::default();

    for record in records.iter().filter(|record| record.considered()) {
        summary.sum_percent += record.percent as u64;
        summary.total_considered += 1;
    }

    summary.average_percent_raw = if summary.total_considered == 0 {
        0.0
    } else {
        summary.sum_percent as f64 / summary.total_considered as f64
    };

    summary
}
