//! Test procedures and the namespace they run against

use crate::core::ModuleId;
use crate::target::{Fault, FaultKind, Instance, LineObserver, SourceUnit, Value};
use std::fmt;
use std::sync::Arc;

/// One executable test.
///
/// A procedure reaches the target only through the [`Namespace`] handed to
/// it, which is bound to a freshly loaded instance for every run. Returning
/// `Err` (or panicking) marks the test as failing.
pub trait TestProcedure: Send + Sync {
    fn run(&self, ns: &mut Namespace<'_>) -> Result<(), Fault>;
}

/// A Rust closure used as a test.
pub struct NativeTest<F> {
    body: F,
}

impl<F> NativeTest<F>
where
    F: Fn(&mut Namespace<'_>) -> Result<(), Fault> + Send + Sync,
{
    pub fn new(body: F) -> Self {
        Self { body }
    }
}

impl<F> TestProcedure for NativeTest<F>
where
    F: Fn(&mut Namespace<'_>) -> Result<(), Fault> + Send + Sync,
{
    fn run(&self, ns: &mut Namespace<'_>) -> Result<(), Fault> {
        (self.body)(ns)
    }
}

/// A zero-argument function in a separate test module.
///
/// The test module is loaded on top of the target instance: names it does
/// not define resolve to the target's globals. Its own lines are never
/// traced.
#[derive(Debug, Clone)]
pub struct ScriptTest {
    module: Arc<SourceUnit>,
    function: String,
}

impl ScriptTest {
    pub fn new(module: Arc<SourceUnit>, function: impl Into<String>) -> Self {
        Self {
            module,
            function: function.into(),
        }
    }

    pub fn module(&self) -> &SourceUnit {
        &self.module
    }

    pub fn function(&self) -> &str {
        &self.function
    }
}

impl TestProcedure for ScriptTest {
    fn run(&self, ns: &mut Namespace<'_>) -> Result<(), Fault> {
        ns.run_script(&self.module, &self.function)
    }
}

/// Handle on the target instance a test runs against.
pub struct Namespace<'a> {
    instance: &'a mut Instance,
    observer: &'a mut dyn LineObserver,
}

impl<'a> Namespace<'a> {
    pub fn new(instance: &'a mut Instance, observer: &'a mut dyn LineObserver) -> Self {
        Self { instance, observer }
    }

    pub fn module(&self) -> &ModuleId {
        self.instance.module()
    }

    /// Call a module-level function of the target.
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, Fault> {
        self.instance.call(&mut *self.observer, name, args)
    }

    /// Call a function value, e.g. one read with [`Namespace::get`].
    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, Fault> {
        self.instance.call_value(&mut *self.observer, callee, args)
    }

    /// Read a module-level name of the target.
    pub fn get(&self, name: &str) -> Result<Value, Fault> {
        self.instance.get(name).ok_or_else(|| {
            Fault::new(
                FaultKind::AttributeError,
                format!("module '{}' has no attribute '{name}'", self.module()),
            )
        })
    }

    pub fn run_script(&mut self, unit: &SourceUnit, function: &str) -> Result<(), Fault> {
        self.instance.run_script(&mut *self.observer, unit, function)
    }
}

impl fmt::Debug for Namespace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("module", self.module())
            .finish_non_exhaustive()
    }
}

/// Fail with an `AssertionError` unless `condition` holds.
pub fn ensure(condition: bool, message: impl Into<String>) -> Result<(), Fault> {
    if condition {
        Ok(())
    } else {
        Err(Fault::assertion(message))
    }
}

/// Fail with an `AssertionError` unless `actual == expected` under Python
/// equality.
pub fn ensure_eq(actual: &Value, expected: impl Into<Value>) -> Result<(), Fault> {
    let expected = expected.into();
    if actual.try_eq(&expected)? {
        Ok(())
    } else {
        Err(Fault::assertion(format!(
            "{} != {}",
            actual.repr(),
            expected.repr()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_eq_uses_python_equality() {
        assert!(ensure_eq(&Value::Float(2.0), 2).is_ok());
        let fault = ensure_eq(&Value::str("a"), "b").unwrap_err();
        assert_eq!(fault.to_string(), "AssertionError: 'a' != 'b'");
    }

    #[test]
    fn test_ensure() {
        assert!(ensure(true, "unused").is_ok());
        assert_eq!(
            ensure(false, "expected a positive result").unwrap_err().message(),
            "expected a positive result"
        );
    }
}
