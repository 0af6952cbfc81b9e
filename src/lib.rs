//! Productivity ranking engine: classifies task deliveries, folds them into
//! per-player productivity averages, converts those into XP and levels, and
//! orders players into a deterministic ranking with documented tie-breaks.

pub mod config;
pub mod engine;
pub mod error;
pub mod telemetry;
