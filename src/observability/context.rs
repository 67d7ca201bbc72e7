//! Thread-local run context for diagnostics.
//!
//! Records which phase of a localization run the current thread is in and
//! which test it is executing. Each test runs on its own execution thread,
//! so the runner sets the context on that thread. Global progress is kept in
//! atomic counters.

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};

static TESTS_COMPLETED: AtomicUsize = AtomicUsize::new(0);
static TESTS_TOTAL: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static CURRENT_CONTEXT: RefCell<RunContext> = const { RefCell::new(RunContext::new()) };
}

/// Snapshot of what the pipeline is doing on this thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunContext {
    pub phase: Option<RunPhase>,
    /// Identifier of the test currently executing
    pub current_test: Option<String>,
}

impl RunContext {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: None,
            current_test: None,
        }
    }
}

/// Stages of a localization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Parsing the target and executing its module body
    Loading,
    /// Trace session is open
    Tracing,
    /// Test procedure is running
    Executing,
    /// Aggregating spectra into scores
    Scoring,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Tracing => write!(f, "tracing"),
            Self::Executing => write!(f, "executing"),
            Self::Scoring => write!(f, "scoring"),
        }
    }
}

/// Restores the previous context on drop.
pub struct ContextGuard {
    previous: RunContext,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT_CONTEXT.with(|ctx| {
            *ctx.borrow_mut() = self.previous.clone();
        });
    }
}

/// Set the current phase until the returned guard drops.
#[must_use]
pub fn set_phase(phase: RunPhase) -> ContextGuard {
    CURRENT_CONTEXT.with(|ctx| {
        let previous = ctx.borrow().clone();
        ctx.borrow_mut().phase = Some(phase);
        ContextGuard { previous }
    })
}

/// Set the current test until the returned guard drops.
#[must_use]
pub fn set_current_test(test_id: impl Into<String>) -> ContextGuard {
    CURRENT_CONTEXT.with(|ctx| {
        let previous = ctx.borrow().clone();
        ctx.borrow_mut().current_test = Some(test_id.into());
        ContextGuard { previous }
    })
}

#[must_use]
pub fn get_current_context() -> RunContext {
    CURRENT_CONTEXT.with(|ctx| ctx.borrow().clone())
}

pub fn reset_context() {
    CURRENT_CONTEXT.with(|ctx| {
        *ctx.borrow_mut() = RunContext::new();
    });
}

/// Set the progress counters (completed and total tests).
pub fn set_progress(completed: usize, total: usize) {
    TESTS_COMPLETED.store(completed, Ordering::Relaxed);
    TESTS_TOTAL.store(total, Ordering::Relaxed);
}

pub fn increment_completed() {
    TESTS_COMPLETED.fetch_add(1, Ordering::Relaxed);
}

/// Current progress as (completed, total).
#[must_use]
pub fn get_progress() -> (usize, usize) {
    (
        TESTS_COMPLETED.load(Ordering::Relaxed),
        TESTS_TOTAL.load(Ordering::Relaxed),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_guard_restores_previous() {
        reset_context();

        let _loading = set_phase(RunPhase::Loading);
        {
            let _executing = set_phase(RunPhase::Executing);
            assert_eq!(get_current_context().phase, Some(RunPhase::Executing));
        }

        assert_eq!(
            get_current_context().phase,
            Some(RunPhase::Loading),
            "Phase should be restored to Loading"
        );
    }

    #[test]
    fn test_nested_test_and_phase() {
        reset_context();

        let _phase = set_phase(RunPhase::Tracing);
        let _test = set_current_test("test_max");

        let ctx = get_current_context();
        assert_eq!(ctx.phase, Some(RunPhase::Tracing));
        assert_eq!(ctx.current_test.as_deref(), Some("test_max"));
    }

    #[test]
    fn test_context_is_per_thread() {
        reset_context();
        let _phase = set_phase(RunPhase::Scoring);

        let other = std::thread::spawn(get_current_context).join().unwrap();
        assert_eq!(other, RunContext::new());
        assert_eq!(get_current_context().phase, Some(RunPhase::Scoring));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(RunPhase::Loading.to_string(), "loading");
        assert_eq!(RunPhase::Tracing.to_string(), "tracing");
        assert_eq!(RunPhase::Executing.to_string(), "executing");
        assert_eq!(RunPhase::Scoring.to_string(), "scoring");
    }

    #[test]
    fn test_empty_context_by_default() {
        reset_context();
        let ctx = get_current_context();
        assert!(ctx.phase.is_none());
        assert!(ctx.current_test.is_none());
    }
}
