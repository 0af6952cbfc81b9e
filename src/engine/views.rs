use serde::Serialize;

use super::aggregate::DeliveryDistribution;
use super::domain::PlayerId;
use super::ranking::RankingCandidate;

/// Public ranking row. Visibility contract: this projection never exposes
/// raw percentages or productivity breakdowns, only the derived XP figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub id: PlayerId,
    pub name: String,
    pub avatar: String,
    pub xp: u32,
    pub level: u32,
    pub weekly_xp: u32,
    pub monthly_xp: u32,
    pub missions_completed: u32,
    pub consistency_bonus: u32,
    pub streak: u32,
}

impl From<RankingCandidate> for RankingEntry {
    fn from(candidate: RankingCandidate) -> Self {
        RankingEntry {
            id: candidate.player.id,
            name: candidate.player.name,
            avatar: candidate.player.avatar,
            xp: candidate.xp,
            level: candidate.level,
            weekly_xp: candidate.weekly_xp,
            monthly_xp: candidate.monthly_xp,
            missions_completed: candidate.missions_completed,
            consistency_bonus: candidate.consistency_bonus,
            streak: candidate.streak,
        }
    }
}

/// Productivity figures visible only on a player's own profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProductivityView {
    pub total_considered: u32,
    pub average_percent: f64,
}

/// Own-profile projection: includes the productivity breakdown the ranking
/// rows deliberately hide.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerProfile {
    pub id: PlayerId,
    pub name: String,
    pub productivity: ProductivityView,
    pub delivery_distribution: DeliveryDistribution,
}
