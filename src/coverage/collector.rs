//! Builds spectra by running every registered test

use super::procedure::{Namespace, NativeTest, ScriptTest, TestProcedure};
use super::runner::CoverageRunner;
use crate::config::FaultmapConfig;
use crate::core::{Result, Spectra};
use crate::observability::{increment_completed, set_progress};
use crate::target::{Fault, SourceUnit};
use std::fmt;
use std::sync::Arc;
use tracing::{debug_span, info, info_span};

/// Ordered mapping of test identifiers to procedures.
#[derive(Default)]
pub struct TestSuite {
    tests: Vec<(String, Box<dyn TestProcedure>)>,
}

impl TestSuite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a procedure. Re-registering an identifier replaces the
    /// earlier procedure and keeps its position.
    pub fn register(
        &mut self,
        test_id: impl Into<String>,
        procedure: impl TestProcedure + 'static,
    ) -> &mut Self {
        let test_id = test_id.into();
        let procedure: Box<dyn TestProcedure> = Box::new(procedure);
        match self.tests.iter_mut().find(|(id, _)| *id == test_id) {
            Some(entry) => entry.1 = procedure,
            None => self.tests.push((test_id, procedure)),
        }
        self
    }

    pub fn register_fn<F>(&mut self, test_id: impl Into<String>, body: F) -> &mut Self
    where
        F: Fn(&mut Namespace<'_>) -> std::result::Result<(), Fault> + Send + Sync + 'static,
    {
        self.register(test_id, NativeTest::new(body))
    }

    /// Register `function` of a test module under its own name.
    pub fn register_script(&mut self, module: &Arc<SourceUnit>, function: &str) -> &mut Self {
        self.register(function, ScriptTest::new(Arc::clone(module), function))
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Identifiers in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tests.iter().map(|(id, _)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn TestProcedure)> {
        self.tests
            .iter()
            .map(|(id, procedure)| (id.as_str(), procedure.as_ref()))
    }
}

impl fmt::Debug for TestSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpectraBuilder {
    runner: CoverageRunner,
}

impl SpectraBuilder {
    pub fn new(runner: CoverageRunner) -> Self {
        Self { runner }
    }

    pub fn from_config(config: &FaultmapConfig) -> Self {
        Self::new(CoverageRunner::from_config(config))
    }

    pub fn runner(&self) -> &CoverageRunner {
        &self.runner
    }

    /// Run every test of `suite` against its own fresh instance of `target`.
    ///
    /// Outcomes keep registration order. A failing test never stops the
    /// run; a target that fails to load does.
    pub fn build(&self, target: &SourceUnit, suite: &TestSuite) -> Result<Spectra> {
        let span = info_span!("spectra", module = %target.module(), tests = suite.len());
        let _enter = span.enter();

        set_progress(0, suite.len());
        let mut spectra = Spectra::new();
        for (test_id, procedure) in suite.iter() {
            let test_span = debug_span!("test", id = test_id);
            let _test = test_span.enter();

            spectra.push(self.runner.run_test(test_id, target, procedure)?);
            increment_completed();
        }

        info!(
            passed = spectra.passing_count(),
            failed = spectra.failing_count(),
            "Collected spectra"
        );
        Ok(spectra)
    }
}

/// Build spectra with default execution limits.
pub fn build_spectra(target: &SourceUnit, suite: &TestSuite) -> Result<Spectra> {
    SpectraBuilder::default().build(target, suite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::procedure::ensure_eq;

    #[test]
    fn test_reregistering_replaces_in_place() {
        let mut suite = TestSuite::new();
        suite
            .register_fn("a", |_| Ok(()))
            .register_fn("b", |_| Ok(()))
            .register_fn("a", |_| Err(Fault::assertion("replaced")));

        assert_eq!(suite.ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(suite.len(), 2);
    }

    #[test]
    fn test_empty_suite_builds_empty_spectra() {
        let target = SourceUnit::inline("subject", "x = 1\n");
        let spectra = build_spectra(&target, &TestSuite::new()).unwrap();
        assert!(spectra.is_empty());
    }

    #[test]
    fn test_outcomes_follow_registration_order() {
        let target = SourceUnit::inline("subject", "def double(x):\n    return x * 2\n");
        let mut suite = TestSuite::new();
        suite
            .register_fn("z_first", |ns| ensure_eq(&ns.call("double", vec![2.into()])?, 4))
            .register_fn("a_second", |ns| ensure_eq(&ns.call("double", vec![2.into()])?, 5));

        let spectra = build_spectra(&target, &suite).unwrap();
        let ids: Vec<&str> = spectra.iter().map(|o| o.test_id.as_str()).collect();
        assert_eq!(ids, vec!["z_first", "a_second"]);
        assert!(spectra.outcomes()[0].passed);
        assert!(!spectra.outcomes()[1].passed);
    }
}
