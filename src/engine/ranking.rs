use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::domain::{Player, ScoreScope, Task, TaskStatus};

/// One player's fully computed figures, ready to be ordered.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingCandidate {
    pub player: Player,
    pub xp: u32,
    pub level: u32,
    pub incorrect_count: u32,
    pub first_completion: Option<DateTime<Utc>>,
    pub weekly_xp: u32,
    pub monthly_xp: u32,
    pub missions_completed: u32,
    pub consistency_bonus: u32,
    pub streak: u32,
}

/// Earliest qualifying completion timestamp among a player's completed,
/// in-scope tasks. Players without one sort last on this key.
pub fn first_completion<'a>(
    tasks: impl IntoIterator<Item = &'a Task>,
    scope: &ScoreScope,
) -> Option<DateTime<Utc>> {
    tasks
        .into_iter()
        .filter(|task| task.status == TaskStatus::Completed && scope.admits_task(task))
        .filter_map(|task| task.completed_date)
        .filter(|completed| scope.window.includes(*completed))
        .min()
}

/// Order candidates into the ranking: XP descending, then incorrect count
/// ascending, then first completion ascending (absent last). The sort is
/// stable, so residual ties keep their input order.
pub fn rank_players(mut candidates: Vec<RankingCandidate>) -> Vec<RankingCandidate> {
    candidates.sort_by(|a, b| {
        b.xp.cmp(&a.xp)
            .then(a.incorrect_count.cmp(&b.incorrect_count))
            .then_with(|| cmp_first_completion(a.first_completion, b.first_completion))
    });
    candidates
}

fn cmp_first_completion(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::domain::PlayerId;
    use chrono::TimeZone;

    fn candidate(id: &str, xp: u32, incorrect: u32, first: Option<i64>) -> RankingCandidate {
        RankingCandidate {
            player: Player {
                id: PlayerId(id.to_string()),
                name: id.to_string(),
                avatar: String::new(),
            },
            xp,
            level: 1,
            incorrect_count: incorrect,
            first_completion: first
                .map(|ts| Utc.timestamp_opt(ts, 0).single().expect("valid ts")),
            weekly_xp: 0,
            monthly_xp: 0,
            missions_completed: 0,
            consistency_bonus: 0,
            streak: 0,
        }
    }

    fn order(candidates: Vec<RankingCandidate>) -> Vec<String> {
        rank_players(candidates)
            .into_iter()
            .map(|candidate| candidate.player.id.0)
            .collect()
    }

    #[test]
    fn orders_by_xp_descending() {
        let ordered = order(vec![
            candidate("u-low", 900, 0, Some(10)),
            candidate("u-high", 950, 5, Some(20)),
        ]);
        assert_eq!(ordered, vec!["u-high", "u-low"]);
    }

    #[test]
    fn equal_xp_breaks_on_incorrect_count() {
        let ordered = order(vec![
            candidate("u-sloppy", 950, 2, Some(10)),
            candidate("u-clean", 950, 0, Some(20)),
        ]);
        assert_eq!(ordered, vec!["u-clean", "u-sloppy"]);
    }

    #[test]
    fn remaining_ties_break_on_first_completion() {
        let ordered = order(vec![
            candidate("u-late", 950, 1, Some(500)),
            candidate("u-early", 950, 1, Some(100)),
            candidate("u-never", 950, 1, None),
        ]);
        assert_eq!(ordered, vec!["u-early", "u-late", "u-never"]);
    }

    #[test]
    fn residual_ties_keep_input_order() {
        let ordered = order(vec![
            candidate("u-first", 950, 1, None),
            candidate("u-second", 950, 1, None),
        ]);
        assert_eq!(ordered, vec!["u-first", "u-second"]);
    }
}
