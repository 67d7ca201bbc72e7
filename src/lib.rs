//! Spectrum-based fault localization.
//!
//! Runs each test of a suite against a freshly loaded target, records which
//! target lines it executed, and ranks lines by how strongly their coverage
//! correlates with failing tests (Tarantula, Ochiai, DStar and an ensemble).
//!
//! ```ignore
//! use faultmap::{build_spectra, compute_suspiciousness, ensure_eq, Metric, SourceUnit, TestSuite};
//!
//! let target = SourceUnit::from_path("subject.py")?;
//! let mut suite = TestSuite::new();
//! suite.register_fn("test_max", |ns| ensure_eq(&ns.call("max_of_two", vec![3.into(), 1.into()])?, 3));
//!
//! let spectra = build_spectra(&target, &suite)?;
//! let table = compute_suspiciousness(&spectra, target.line_count());
//! for (line, score) in table.top(Metric::Ensemble, 5) {
//!     println!("{line}: {:.3}", score.ensemble);
//! }
//! ```

pub mod config;
pub mod core;
pub mod coverage;
pub mod observability;
pub mod scoring;
pub mod target;

pub use crate::config::{load_config, FaultmapConfig};
pub use crate::core::{
    DegenerateInput, Error, LineStatistics, Metric, ModuleId, Result, ResultExt, ScoreTable,
    Spectra, SuspiciousnessScore, TestOutcome,
};
pub use crate::coverage::{
    build_spectra, ensure, ensure_eq, CoverageRunner, Namespace, ScriptTest, SpectraBuilder,
    TestProcedure, TestSuite, TraceSession,
};
pub use crate::scoring::{compute_suspiciousness, EnsembleStrategy, SuspiciousnessEngine};
pub use crate::target::{ExecutionLimits, Fault, FaultKind, SourceUnit, Value};

/// Collect spectra for `suite` and score every line of `target`.
pub fn localize(target: &SourceUnit, suite: &TestSuite, config: &FaultmapConfig) -> Result<ScoreTable> {
    let spectra = SpectraBuilder::from_config(config).build(target, suite)?;
    Ok(SuspiciousnessEngine::from_config(config).compute(&spectra, target.line_count()))
}
