//! Executes one test against one fresh target instance

use super::procedure::{Namespace, TestProcedure};
use super::tracer::TraceSession;
use crate::config::FaultmapConfig;
use crate::core::{Error, Result, TestOutcome};
use crate::observability::{set_current_test, set_phase, RunPhase};
use crate::target::{ExecutionLimits, Fault, FaultKind, Instance, NoTrace, SourceUnit};
use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use tracing::{debug, warn};

/// Stack for the thread a test executes on. Evaluation recurses once per
/// nested target call, so deep call-depth limits need more than the default.
pub const EXECUTION_STACK_SIZE: usize = 64 * 1024 * 1024;

/// What one test run observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub executed_lines: BTreeSet<usize>,
    pub passed: bool,
    pub failure_detail: Option<String>,
}

impl Execution {
    pub fn into_outcome(self, test_id: impl Into<String>) -> TestOutcome {
        TestOutcome {
            test_id: test_id.into(),
            executed_lines: self.executed_lines,
            passed: self.passed,
            failure_detail: self.failure_detail,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverageRunner {
    limits: ExecutionLimits,
}

impl CoverageRunner {
    pub fn new(limits: ExecutionLimits) -> Self {
        Self { limits }
    }

    pub fn from_config(config: &FaultmapConfig) -> Self {
        Self::new(config.limits())
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }

    /// Run `test` against a freshly loaded copy of `target`.
    ///
    /// A failing, timed-out or panicking test is a failing [`Execution`].
    /// Only a target that cannot be loaded is an error.
    pub fn run(&self, target: &SourceUnit, test: &dyn TestProcedure) -> Result<Execution> {
        self.run_on_thread(None, target, test)
    }

    /// [`CoverageRunner::run`] tagged with the test's identifier.
    pub fn run_test(
        &self,
        test_id: &str,
        target: &SourceUnit,
        test: &dyn TestProcedure,
    ) -> Result<TestOutcome> {
        let execution = self.run_on_thread(Some(test_id), target, test)?;
        Ok(execution.into_outcome(test_id))
    }

    fn run_on_thread(
        &self,
        test_id: Option<&str>,
        target: &SourceUnit,
        test: &dyn TestProcedure,
    ) -> Result<Execution> {
        let limits = self.limits;
        thread::scope(|scope| {
            let handle = thread::Builder::new()
                .name("faultmap-exec".to_string())
                .stack_size(EXECUTION_STACK_SIZE)
                .spawn_scoped(scope, move || execute(test_id, target, test, limits))
                .map_err(|e| {
                    Error::External(
                        anyhow::Error::new(e).context("failed to spawn test execution thread"),
                    )
                })?;

            handle.join().unwrap_or_else(|payload| {
                Err(Error::External(anyhow::anyhow!(
                    "test execution thread panicked: {}",
                    panic_message(payload.as_ref())
                )))
            })
        })
    }
}

fn execute(
    test_id: Option<&str>,
    target: &SourceUnit,
    test: &dyn TestProcedure,
    limits: ExecutionLimits,
) -> Result<Execution> {
    let _test = test_id.map(set_current_test);

    let mut instance = {
        let _phase = set_phase(RunPhase::Loading);
        let fresh = target.reload()?;
        Instance::load(&fresh, limits, &mut NoTrace)?
    };

    let mut session = TraceSession::new(instance.module().clone());
    let result = {
        let _phase = set_phase(RunPhase::Tracing);
        let mut trace = session.begin();
        instance.arm_deadline();

        let _executing = set_phase(RunPhase::Executing);
        let mut ns = Namespace::new(&mut instance, &mut *trace);
        let result = panic::catch_unwind(AssertUnwindSafe(|| test.run(&mut ns)));
        result
    };
    instance.disarm_deadline();

    let executed_lines = session.extract();
    session.reset();

    let failure = match result {
        Ok(Ok(())) => None,
        Ok(Err(fault)) => Some(fault),
        Err(payload) => Some(Fault::new(FaultKind::Panic, panic_message(payload.as_ref()))),
    };

    let test_id = test_id.unwrap_or("<anonymous>");
    match &failure {
        None => debug!(test = test_id, lines = executed_lines.len(), "Test passed"),
        Some(fault) if fault.is_timeout() => {
            warn!(test = test_id, lines = executed_lines.len(), "Test timed out: {}", fault)
        }
        Some(fault) => debug!(test = test_id, lines = executed_lines.len(), "Test failed: {}", fault),
    }

    Ok(Execution {
        executed_lines,
        passed: failure.is_none(),
        failure_detail: failure.map(|fault| fault.render()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "test panicked".to_string()
    }
}
