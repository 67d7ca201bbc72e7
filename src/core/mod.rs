//! Core data model shared by the coverage and scoring stages

pub mod errors;
pub mod types;

pub use errors::{Error, Result, ResultExt};
pub use types::{
    DegenerateInput, LineStatistics, Metric, ModuleId, ScoreTable, Spectra, SuspiciousnessScore,
    TestOutcome,
};
