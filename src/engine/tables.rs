use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::DeliveryClassification;

/// Failure reported by an externally owned configuration table.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("no value configured for {0}")]
    Missing(&'static str),
    #[error("configuration source unavailable: {0}")]
    Unavailable(String),
}

/// Externally owned, hot-reloadable mapping from delivery classification to
/// productivity percent. The engine re-reads it on every lookup and never
/// caches across computations.
pub trait PercentageProvider: Send + Sync {
    /// Percent for a non-`Ignore` classification. The engine clamps the
    /// returned value; providers may hand back any configured integer.
    fn percentage(&self, classification: DeliveryClassification) -> Result<i64, TableError>;
}

/// Externally owned table of level thresholds.
pub trait LevelRuleProvider: Send + Sync {
    fn rules(&self) -> Result<Vec<LevelRule>, TableError>;
}

/// One row of the level table: the lowest XP granting `level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRule {
    pub level: u32,
    pub xp_required: u32,
}

/// Fail-closed percent table used whenever the configured source is
/// unreachable: early 100, on-time 90, late 50, rework 20, ignore 0.
pub const fn default_percentage(classification: DeliveryClassification) -> u8 {
    match classification {
        DeliveryClassification::Early => 100,
        DeliveryClassification::OnTime => 90,
        DeliveryClassification::Late => 50,
        DeliveryClassification::Rework => 20,
        DeliveryClassification::Ignore => 0,
    }
}

/// Fail-closed level table: one level per 200 XP up to the 1000 XP ceiling
/// a pure percent average can reach.
pub fn default_level_rules() -> Vec<LevelRule> {
    vec![
        LevelRule { level: 1, xp_required: 0 },
        LevelRule { level: 2, xp_required: 200 },
        LevelRule { level: 3, xp_required: 400 },
        LevelRule { level: 4, xp_required: 600 },
        LevelRule { level: 5, xp_required: 800 },
        LevelRule { level: 6, xp_required: 1000 },
    ]
}

pub fn clamp_percent(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

/// Resolve a percent through the provider, clamped to 0-100. Provider
/// failures degrade to the default table instead of propagating into the
/// aggregation pipeline.
pub fn lookup_percentage(
    provider: &dyn PercentageProvider,
    classification: DeliveryClassification,
) -> u8 {
    match provider.percentage(classification) {
        Ok(value) => clamp_percent(value),
        Err(error) => {
            warn!(
                classification = classification.label(),
                %error,
                "percentage source failed, using default table"
            );
            default_percentage(classification)
        }
    }
}

/// Resolve the level table, falling back to the default rules on failure.
pub fn load_level_rules(provider: &dyn LevelRuleProvider) -> Vec<LevelRule> {
    match provider.rules() {
        Ok(rules) if !rules.is_empty() => rules,
        Ok(_) => {
            warn!("level rule source returned an empty table, using default rules");
            default_level_rules()
        }
        Err(error) => {
            warn!(%error, "level rule source failed, using default rules");
            default_level_rules()
        }
    }
}

/// In-process table set used by the demo binary and tests. Production
/// deployments inject providers backed by their own configuration store.
#[derive(Debug, Clone)]
pub struct StaticTables {
    percentages: BTreeMap<DeliveryClassification, i64>,
    levels: Vec<LevelRule>,
}

impl StaticTables {
    pub fn new(percentages: BTreeMap<DeliveryClassification, i64>, levels: Vec<LevelRule>) -> Self {
        Self { percentages, levels }
    }

    pub fn set_percentage(&mut self, classification: DeliveryClassification, percent: i64) {
        self.percentages.insert(classification, percent);
    }

    pub fn set_level_rules(&mut self, levels: Vec<LevelRule>) {
        self.levels = levels;
    }
}

impl Default for StaticTables {
    fn default() -> Self {
        let percentages = [
            DeliveryClassification::Early,
            DeliveryClassification::OnTime,
            DeliveryClassification::Late,
            DeliveryClassification::Rework,
        ]
        .into_iter()
        .map(|classification| (classification, default_percentage(classification) as i64))
        .collect();

        Self {
            percentages,
            levels: default_level_rules(),
        }
    }
}

impl PercentageProvider for StaticTables {
    fn percentage(&self, classification: DeliveryClassification) -> Result<i64, TableError> {
        self.percentages
            .get(&classification)
            .copied()
            .ok_or(TableError::Missing(classification.label()))
    }
}

impl LevelRuleProvider for StaticTables {
    fn rules(&self) -> Result<Vec<LevelRule>, TableError> {
        Ok(self.levels.clone())
    }
}
