//! Diagnostics for localization runs.
//!
//! - **Tracing setup**: `init_tracing` installs an env-filtered subscriber
//! - **Context tracking**: thread-local phase and current test
//! - **Progress tracking**: atomic counters of completed tests
//!
//! ```ignore
//! use faultmap::observability::{set_phase, set_current_test, RunPhase};
//!
//! let _phase = set_phase(RunPhase::Executing);
//! let _test = set_current_test("test_max");
//! ```

pub mod context;
pub mod tracing;

pub use self::tracing::init_tracing;
pub use context::{
    get_current_context, get_progress, increment_completed, reset_context, set_current_test,
    set_phase, set_progress, ContextGuard, RunContext, RunPhase,
};
