use serde::{Deserialize, Serialize};

use super::domain::{PlayerId, ScoreWindow};
use super::tables::LevelRule;

/// Half-up rounding: ties away from zero on the upper side, never banker's
/// rounding. `round_half_up(1.5) == 2`, `round_half_up(1.49) == 1`,
/// `round_half_up(-0.5) == 0`.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// XP is the percent average scaled by ten, rounded half-up, floored at zero.
pub fn xp_from_average(average_percent: f64) -> u32 {
    round_half_up(average_percent * 10.0).max(0) as u32
}

/// Highest rule whose threshold is within reach; an empty or unmatched table
/// resolves to the lowest defined level (or 1 when nothing is defined).
pub fn resolve_level(xp: u32, rules: &[LevelRule]) -> u32 {
    rules
        .iter()
        .filter(|rule| rule.xp_required <= xp)
        .max_by_key(|rule| rule.xp_required)
        .map(|rule| rule.level)
        .unwrap_or_else(|| rules.iter().map(|rule| rule.level).min().unwrap_or(1))
}

/// Scopes in which an externally computed streak bonus participates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakInclusion {
    pub total: bool,
    pub weekly: bool,
    pub monthly: bool,
}

/// Externally computed streak data for one player. The XP fields are added
/// after percent conversion and never feed the productivity average.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakBonus {
    pub total_xp: u32,
    pub weekly_xp: u32,
    pub monthly_xp: u32,
    pub include_in: StreakInclusion,
    pub streak_days: u32,
    pub consistency_bonus: u32,
}

impl StreakBonus {
    /// Bonus XP applicable to a window, honoring the per-scope gate.
    pub fn xp_for_window(&self, window: &ScoreWindow) -> u32 {
        match window {
            ScoreWindow::AllTime if self.include_in.total => self.total_xp,
            ScoreWindow::Weekly(_) if self.include_in.weekly => self.weekly_xp,
            ScoreWindow::Monthly(_) if self.include_in.monthly => self.monthly_xp,
            _ => 0,
        }
    }
}

/// External collaborator supplying per-player streak bonuses.
pub trait StreakProvider: Send + Sync {
    fn streak_for(&self, player_id: &PlayerId) -> Option<StreakBonus>;
}

/// Null object for deployments without the streak system.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStreaks;

impl StreakProvider for NoStreaks {
    fn streak_for(&self, _player_id: &PlayerId) -> Option<StreakBonus> {
        None
    }
}
