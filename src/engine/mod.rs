//! Productivity ranking engine.
//!
//! Data flows one way: raw task events -> classifier -> (rework filter) ->
//! aggregator -> XP/level -> ranking orderer -> projections. The submission
//! ledger and the backfill adapter sit beside that pipeline, feeding
//! tie-break data and canonical records.

pub mod aggregate;
pub mod backfill;
pub mod classify;
pub mod domain;
pub mod ledger;
pub mod ranking;
pub mod repository;
pub mod rework;
pub mod router;
pub mod service;
pub mod tables;
pub mod views;
pub mod xp;

#[cfg(test)]
mod tests;

pub use aggregate::{aggregate_records, aggregate_tasks, DeliveryDistribution, ProductivitySummary};
pub use backfill::{backfill_records, record_for_task, CsvTaskImporter, TaskImportError};
pub use classify::classify;
pub use domain::{
    CompetitionId, DeliveryClassification, IncorrectSubmissionEntry, PersistentTaskRecord, Player,
    PlayerAggregate, PlayerId, ScoreScope, ScoreWindow, Task, TaskId, TaskStatus,
};
pub use ledger::{IncorrectSource, LedgerError, MemoryLedger, SubmissionLedger};
pub use ranking::{first_completion, rank_players, RankingCandidate};
pub use repository::{
    MemoryRecordRepository, RecomputeHook, RecomputeNotice, RecordRepository, RepositoryError,
};
pub use rework::{enter_rework, reconclude, ReconcludeOptions, ReworkTransition};
pub use router::{ranking_router, RankingApiState};
pub use service::{RankingService, ServiceError};
pub use tables::{
    default_level_rules, default_percentage, lookup_percentage, LevelRule, LevelRuleProvider,
    PercentageProvider, StaticTables, TableError,
};
pub use views::{PlayerProfile, ProductivityView, RankingEntry};
pub use xp::{
    resolve_level, round_half_up, xp_from_average, NoStreaks, StreakBonus, StreakInclusion,
    StreakProvider,
};
