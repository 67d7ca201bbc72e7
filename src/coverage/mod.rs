//! Coverage spectra collection.
//!
//! [`CoverageRunner`] executes one test against a fresh target instance
//! under a [`TraceSession`]; [`SpectraBuilder`] does that for every test of
//! a [`TestSuite`]. Reports produced elsewhere can be imported through
//! [`lcov`].

pub mod collector;
pub mod lcov;
pub mod procedure;
pub mod runner;
pub mod tracer;

pub use collector::{build_spectra, SpectraBuilder, TestSuite};
pub use procedure::{ensure, ensure_eq, Namespace, NativeTest, ScriptTest, TestProcedure};
pub use runner::{CoverageRunner, Execution, EXECUTION_STACK_SIZE};
pub use tracer::{ActiveTrace, TraceSession, TraceState};
