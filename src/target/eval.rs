//! Tree-walking evaluator for target programs.
//!
//! Each [`Instance`] owns the globals of one loaded module. Every statement
//! reports its line to a [`LineObserver`] before it runs, so the observer
//! sees exactly the lines a test drove. Faults unwind as `Err` values and
//! pick up one traceback frame per function they leave.

use super::ast::{AssignTarget, BinOp, BoolOp, Expr, Literal, Program, Stmt, StmtKind, UnaryOp};
use super::builtins::{call_method, Builtin};
use super::fault::{Fault, FaultKind};
use super::parser::parse_program;
use super::source::SourceUnit;
use super::value::{self, resolve_index, Function, Globals, Value, ValueIter};
use crate::core::{Error, ModuleId, Result};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Frame name used for module bodies in tracebacks.
pub const MODULE_FRAME: &str = "<module>";

/// Bounds applied to every execution of target code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Wall-clock budget per test. `None` disables the deadline.
    pub timeout: Option<Duration>,
    /// Nested calls of target functions before `RecursionError`.
    pub max_call_depth: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_millis(5000)),
            max_call_depth: 100,
        }
    }
}

/// Receives a `(module, line)` event before each statement executes.
pub trait LineObserver {
    fn on_line(&mut self, module: &ModuleId, line: usize);
}

/// Observer that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrace;

impl LineObserver for NoTrace {
    fn on_line(&mut self, _module: &ModuleId, _line: usize) {}
}

/// A loaded target module with its own, unshared globals.
pub struct Instance {
    module: ModuleId,
    globals: Globals,
    limits: ExecutionLimits,
    deadline: Option<Instant>,
}

impl Instance {
    /// Parse the unit and execute its module body.
    ///
    /// Syntax errors, unsupported constructs and faults raised by the module
    /// body are all load errors.
    pub fn load(
        unit: &SourceUnit,
        limits: ExecutionLimits,
        observer: &mut dyn LineObserver,
    ) -> Result<Self> {
        let module = unit.module().clone();
        let program = parse_program(&module, unit.text())?;

        let mut instance = Self {
            module: module.clone(),
            globals: Globals::new(),
            limits,
            deadline: None,
        };
        instance.arm_deadline();
        let globals = instance.globals.clone();
        let outcome = instance
            .machine(observer)
            .exec_module(&module, &globals, &program);
        instance.disarm_deadline();

        outcome.map_err(|fault| Error::load(module.as_str(), fault.line(), fault.to_string()))?;
        tracing::debug!(module = %module, names = ?instance.globals.names(), "Loaded target module");
        Ok(instance)
    }

    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }

    /// Start the per-test wall clock.
    pub fn arm_deadline(&mut self) {
        self.deadline = self.limits.timeout.map(|timeout| Instant::now() + timeout);
    }

    pub fn disarm_deadline(&mut self) {
        self.deadline = None;
    }

    /// Look up a module-level name.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.globals.get(name)
    }

    /// Call a module-level function by name.
    pub fn call(
        &mut self,
        observer: &mut dyn LineObserver,
        name: &str,
        args: Vec<Value>,
    ) -> std::result::Result<Value, Fault> {
        let callee = self.get(name).ok_or_else(|| {
            Fault::new(
                FaultKind::AttributeError,
                format!("module '{}' has no attribute '{name}'", self.module),
            )
        })?;
        self.call_value(observer, &callee, args)
    }

    pub fn call_value(
        &mut self,
        observer: &mut dyn LineObserver,
        callee: &Value,
        args: Vec<Value>,
    ) -> std::result::Result<Value, Fault> {
        self.machine(observer).call_value(callee, args)
    }

    /// Load a test module whose globals fall back to this instance's, then
    /// call its zero-argument `function`.
    ///
    /// Anything that keeps the test module from loading is an `ImportError`
    /// of this one test, never a load error of the target.
    pub fn run_script(
        &mut self,
        observer: &mut dyn LineObserver,
        unit: &SourceUnit,
        function: &str,
    ) -> std::result::Result<(), Fault> {
        if unit.module() == &self.module {
            return Err(Fault::new(
                FaultKind::ImportError,
                format!("test module '{}' shares its name with the target", self.module),
            ));
        }
        let program = parse_program(unit.module(), unit.text())
            .map_err(|e| Fault::new(FaultKind::ImportError, e.to_string()))?;

        let scope = Globals::child_of(&self.globals);
        let result = self.run_in_scope(observer, unit.module(), &scope, &program, function);
        scope.clear();
        result
    }

    fn run_in_scope(
        &mut self,
        observer: &mut dyn LineObserver,
        module: &ModuleId,
        scope: &Globals,
        program: &Program,
        function: &str,
    ) -> std::result::Result<(), Fault> {
        let mut machine = self.machine(observer);
        machine
            .exec_module(module, scope, program)
            .map_err(|fault| {
                Fault::new(
                    FaultKind::ImportError,
                    format!("test module '{module}' failed to load: {fault}"),
                )
            })?;

        let callee = scope.get(function).ok_or_else(|| {
            Fault::new(
                FaultKind::AttributeError,
                format!("module '{module}' has no attribute '{function}'"),
            )
        })?;
        machine.call_value(&callee, Vec::new()).map(|_| ())
    }

    fn machine<'o>(&self, observer: &'o mut dyn LineObserver) -> Machine<'o> {
        Machine {
            limits: self.limits,
            deadline: self.deadline,
            depth: 0,
            observer,
        }
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        // Functions hold their globals; break the cycle.
        self.globals.clear();
    }
}

/// Control flow out of a statement.
enum Flow {
    Next,
    Return(Value),
    Break,
    Continue,
}

struct Frame {
    module: ModuleId,
    function: String,
    globals: Globals,
    /// `None` at module level, where assignments bind globals.
    locals: Option<HashMap<String, Value>>,
    line: usize,
}

impl Frame {
    fn store(&mut self, name: &str, value: Value) {
        match &mut self.locals {
            Some(locals) => {
                locals.insert(name.to_string(), value);
            }
            None => self.globals.set(name, value),
        }
    }

    fn load(&self, name: &str) -> std::result::Result<Value, Fault> {
        if let Some(value) = self.locals.as_ref().and_then(|locals| locals.get(name)) {
            return Ok(value.clone());
        }
        if let Some(value) = self.globals.get(name) {
            return Ok(value);
        }
        Builtin::from_name(name).map(Value::Builtin).ok_or_else(|| {
            Fault::new(
                FaultKind::NameError,
                format!("name '{name}' is not defined"),
            )
        })
    }
}

type Outcome<T> = std::result::Result<T, Fault>;

struct Machine<'o> {
    limits: ExecutionLimits,
    deadline: Option<Instant>,
    depth: usize,
    observer: &'o mut dyn LineObserver,
}

impl Machine<'_> {
    fn exec_module(&mut self, module: &ModuleId, globals: &Globals, program: &Program) -> Outcome<()> {
        let mut frame = Frame {
            module: module.clone(),
            function: MODULE_FRAME.to_string(),
            globals: globals.clone(),
            locals: None,
            line: 0,
        };
        match self.exec_block(&mut frame, &program.body) {
            Ok(Flow::Next) => Ok(()),
            Ok(flow) => Err(misplaced(&flow)),
            Err(mut fault) => {
                fault.push_frame(module.as_str(), MODULE_FRAME, frame.line);
                Err(fault)
            }
        }
    }

    /// Check the deadline and report `line` before it runs.
    fn step(&mut self, frame: &mut Frame, line: usize) -> Outcome<()> {
        if let (Some(deadline), Some(timeout)) = (self.deadline, self.limits.timeout) {
            if Instant::now() >= deadline {
                return Err(Fault::timeout(timeout));
            }
        }
        frame.line = line;
        self.observer.on_line(&frame.module, line);
        Ok(())
    }

    fn exec_block(&mut self, frame: &mut Frame, body: &[Stmt]) -> Outcome<Flow> {
        for stmt in body {
            match self.exec_stmt(frame, stmt)? {
                Flow::Next => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Next)
    }

    fn exec_stmt(&mut self, frame: &mut Frame, stmt: &Stmt) -> Outcome<Flow> {
        self.step(frame, stmt.line)?;

        match &stmt.kind {
            StmtKind::FunctionDef(def) => {
                let defaults = def
                    .params
                    .iter()
                    .map(|param| {
                        param
                            .default
                            .as_ref()
                            .map(|default| self.eval(frame, default))
                            .transpose()
                    })
                    .collect::<Outcome<Vec<_>>>()?;
                let function = Function {
                    def: Rc::clone(def),
                    module: frame.module.clone(),
                    globals: frame.globals.clone(),
                    defaults,
                };
                frame.store(&def.name, Value::Function(Rc::new(function)));
            }
            StmtKind::Expr(expr) => {
                self.eval(frame, expr)?;
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval(frame, value)?;
                self.assign(frame, target, value)?;
            }
            StmtKind::AugAssign { target, op, value } => self.aug_assign(frame, target, *op, value)?,
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(frame, expr)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::If { branches, orelse } => {
                for (index, branch) in branches.iter().enumerate() {
                    if index > 0 {
                        self.step(frame, branch.line)?;
                    }
                    if self.eval(frame, &branch.condition)?.truthy() {
                        return self.exec_block(frame, &branch.body);
                    }
                }
                return self.exec_block(frame, orelse);
            }
            StmtKind::While { condition, body } => {
                let mut first = true;
                loop {
                    if !first {
                        self.step(frame, stmt.line)?;
                    }
                    first = false;
                    if !self.eval(frame, condition)?.truthy() {
                        break;
                    }
                    match self.exec_block(frame, body)? {
                        Flow::Break => break,
                        Flow::Next | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
            }
            StmtKind::For { target, iter, body } => {
                let iterable = self.eval(frame, iter)?;
                for item in ValueIter::new(&iterable)? {
                    frame.store(target, item);
                    match self.exec_block(frame, body)? {
                        Flow::Break => break,
                        Flow::Next | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                    self.step(frame, stmt.line)?;
                }
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Pass => {}
            StmtKind::Assert { test, message } => {
                if !self.eval(frame, test)?.truthy() {
                    let message = match message {
                        Some(expr) => self.eval(frame, expr)?.to_text()?,
                        None => String::new(),
                    };
                    return Err(Fault::assertion(message));
                }
            }
            StmtKind::Raise { exception, message } => {
                let message = match message {
                    Some(expr) => self.eval(frame, expr)?.to_text()?,
                    None => String::new(),
                };
                return Err(Fault::new(FaultKind::from_name(exception), message));
            }
        }
        Ok(Flow::Next)
    }

    fn assign(&mut self, frame: &mut Frame, target: &AssignTarget, value: Value) -> Outcome<()> {
        match target {
            AssignTarget::Name(name) => {
                frame.store(name, value);
                Ok(())
            }
            AssignTarget::Subscript { value: container, index } => {
                let container = self.eval(frame, container)?;
                let index = self.eval(frame, index)?;
                set_item(&container, &index, value)
            }
        }
    }

    fn aug_assign(&mut self, frame: &mut Frame, target: &AssignTarget, op: BinOp, value: &Expr) -> Outcome<()> {
        match target {
            AssignTarget::Name(name) => {
                let current = frame.load(name)?;
                let rhs = self.eval(frame, value)?;
                let updated = in_place(op, &current, &rhs)?;
                frame.store(name, updated);
            }
            AssignTarget::Subscript { value: container, index } => {
                let container = self.eval(frame, container)?;
                let index = self.eval(frame, index)?;
                let current = get_item(&container, &index)?;
                let rhs = self.eval(frame, value)?;
                set_item(&container, &index, in_place(op, &current, &rhs)?)?;
            }
        }
        Ok(())
    }

    fn eval(&mut self, frame: &mut Frame, expr: &Expr) -> Outcome<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::None => Value::None,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(f) => Value::Float(*f),
                Literal::Str(s) => Value::Str(Rc::clone(s)),
            }),
            Expr::Name(name) => frame.load(name),
            Expr::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.eval(frame, item))
                    .collect::<Outcome<Vec<_>>>()?;
                Ok(Value::list(items))
            }
            Expr::Subscript { value, index } => {
                let container = self.eval(frame, value)?;
                let index = self.eval(frame, index)?;
                get_item(&container, &index)
            }
            Expr::Call { func, args } => {
                let callee = self.eval(frame, func)?;
                let args = self.eval_args(frame, args)?;
                self.call_value(&callee, args)
            }
            Expr::Method { object, name, args } => {
                let object = self.eval(frame, object)?;
                let args = self.eval_args(frame, args)?;
                call_method(&object, name, args)
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(frame, left)?;
                let right = self.eval(frame, right)?;
                value::binary(*op, &left, &right)
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(frame, operand)?;
                match op {
                    UnaryOp::Neg => value::negate(&operand),
                    UnaryOp::Pos => value::positive(&operand),
                }
            }
            Expr::Not(operand) => Ok(Value::Bool(!self.eval(frame, operand)?.truthy())),
            Expr::BoolOp { op, left, right } => {
                let left = self.eval(frame, left)?;
                match (op, left.truthy()) {
                    (BoolOp::And, false) | (BoolOp::Or, true) => Ok(left),
                    _ => self.eval(frame, right),
                }
            }
            Expr::Compare { first, rest } => {
                let mut left = self.eval(frame, first)?;
                for (op, operand) in rest {
                    let right = self.eval(frame, operand)?;
                    if !value::compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::IfExp { test, body, orelse } => {
                if self.eval(frame, test)?.truthy() {
                    self.eval(frame, body)
                } else {
                    self.eval(frame, orelse)
                }
            }
        }
    }

    fn eval_args(&mut self, frame: &mut Frame, args: &[Expr]) -> Outcome<Vec<Value>> {
        args.iter().map(|arg| self.eval(frame, arg)).collect()
    }

    fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> Outcome<Value> {
        match callee {
            Value::Function(function) => self.call_function(function, args),
            Value::Builtin(builtin) => builtin.call(&args),
            other => Err(Fault::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_function(&mut self, function: &Rc<Function>, args: Vec<Value>) -> Outcome<Value> {
        let locals = bind_arguments(function, args)?;
        if self.depth >= self.limits.max_call_depth {
            return Err(Fault::new(
                FaultKind::RecursionError,
                "maximum recursion depth exceeded",
            ));
        }

        let mut frame = Frame {
            module: function.module.clone(),
            function: function.def.name.clone(),
            globals: function.globals.clone(),
            locals: Some(locals),
            line: 0,
        };
        self.depth += 1;
        let result = self.exec_block(&mut frame, &function.def.body);
        self.depth -= 1;

        match result {
            Ok(Flow::Next) => Ok(Value::None),
            Ok(Flow::Return(value)) => Ok(value),
            Ok(flow) => Err(misplaced(&flow)),
            Err(mut fault) => {
                fault.push_frame(frame.module.as_str(), &frame.function, frame.line);
                Err(fault)
            }
        }
    }
}

fn misplaced(flow: &Flow) -> Fault {
    let keyword = match flow {
        Flow::Break => "break",
        Flow::Continue => "continue",
        _ => "return",
    };
    Fault::new(
        FaultKind::Other("SyntaxError".to_string()),
        format!("'{keyword}' outside loop"),
    )
}

fn bind_arguments(function: &Function, args: Vec<Value>) -> Outcome<HashMap<String, Value>> {
    let params = &function.def.params;
    let name = &function.def.name;
    if args.len() > params.len() {
        return Err(Fault::type_error(format!(
            "{name}() takes {} positional argument(s) but {} were given",
            params.len(),
            args.len()
        )));
    }

    let supplied = args.len();
    let mut locals: HashMap<String, Value> = params
        .iter()
        .map(|param| param.name.clone())
        .zip(args)
        .collect();

    let mut missing = Vec::new();
    for (param, default) in params.iter().zip(&function.defaults).skip(supplied) {
        match default {
            Some(value) => {
                locals.insert(param.name.clone(), value.clone());
            }
            None => missing.push(format!("'{}'", param.name)),
        }
    }
    if !missing.is_empty() {
        return Err(Fault::type_error(format!(
            "{name}() missing {} required positional argument(s): {}",
            missing.len(),
            missing.join(", ")
        )));
    }
    Ok(locals)
}

/// `x op= y`. Lists extend in place, like Python's `+=`.
fn in_place(op: BinOp, current: &Value, rhs: &Value) -> Outcome<Value> {
    if let (BinOp::Add, Value::List(items)) = (op, current) {
        let extra: Vec<Value> = ValueIter::new(rhs)?.collect();
        items.borrow_mut().extend(extra);
        return Ok(current.clone());
    }
    value::binary(op, current, rhs)
}

fn get_item(container: &Value, index: &Value) -> Outcome<Value> {
    match container {
        Value::List(items) => {
            let items = items.borrow();
            let position = resolve_index(index, items.len(), "list")?;
            Ok(items[position].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let position = resolve_index(index, chars.len(), "string")?;
            Ok(Value::Str(chars[position].to_string().into()))
        }
        Value::Range(range) => {
            let position = resolve_index(index, range.len(), "range object")?;
            Ok(Value::Int(range.start + position as i64 * range.step))
        }
        other => Err(Fault::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn set_item(container: &Value, index: &Value, value: Value) -> Outcome<()> {
    match container {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let position = resolve_index(index, items.len(), "list assignment")?;
            items[position] = value;
            Ok(())
        }
        other => Err(Fault::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use std::collections::BTreeSet;

    #[derive(Default)]
    struct Lines(BTreeSet<(String, usize)>);

    impl LineObserver for Lines {
        fn on_line(&mut self, module: &ModuleId, line: usize) {
            self.0.insert((module.to_string(), line));
        }
    }

    impl Lines {
        fn of(&self, module: &str) -> Vec<usize> {
            self.0
                .iter()
                .filter(|(m, _)| m == module)
                .map(|(_, line)| *line)
                .collect()
        }
    }

    fn load(source: &str) -> Instance {
        let unit = SourceUnit::inline("subject", source);
        Instance::load(&unit, ExecutionLimits::default(), &mut NoTrace).unwrap()
    }

    fn call(instance: &mut Instance, name: &str, args: Vec<Value>) -> Outcome<Value> {
        instance.call(&mut NoTrace, name, args)
    }

    #[test]
    fn test_traces_only_executed_lines() {
        let mut instance = load(indoc! {"
            def classify(n):
                if n < 0:
                    return 'negative'
                elif n == 0:
                    return 'zero'
                else:
                    return 'positive'
        "});
        let mut lines = Lines::default();
        let result = instance.call(&mut lines, "classify", vec![Value::Int(5)]).unwrap();

        assert_eq!(result, Value::str("positive"));
        assert_eq!(lines.of("subject"), vec![2, 4, 7]);
    }

    #[test]
    fn test_loops_and_accumulation() {
        let mut instance = load(indoc! {"
            def total(items):
                acc = 0
                for item in items:
                    if item < 0:
                        continue
                    if item > 100:
                        break
                    acc += item
                return acc

            def countdown(n):
                steps = []
                while n > 0:
                    steps.append(n)
                    n -= 1
                return steps
        "});
        let items = Value::list(vec![1.into(), (-5).into(), 2.into(), 500.into(), 7.into()]);
        assert_eq!(call(&mut instance, "total", vec![items]).unwrap(), Value::Int(3));
        assert_eq!(
            call(&mut instance, "countdown", vec![3.into()]).unwrap(),
            Value::list(vec![3.into(), 2.into(), 1.into()])
        );
    }

    #[test]
    fn test_defaults_and_arity_errors() {
        let mut instance = load(indoc! {"
            def scale(x, factor=2):
                return x * factor
        "});
        assert_eq!(call(&mut instance, "scale", vec![4.into()]).unwrap(), Value::Int(8));
        assert_eq!(call(&mut instance, "scale", vec![4.into(), 3.into()]).unwrap(), Value::Int(12));

        let fault = call(&mut instance, "scale", vec![]).unwrap_err();
        assert_eq!(fault.kind(), &FaultKind::TypeError);
        assert_eq!(
            fault.message(),
            "scale() missing 1 required positional argument(s): 'x'"
        );
        let fault = call(&mut instance, "scale", vec![1.into(), 2.into(), 3.into()]).unwrap_err();
        assert_eq!(fault.kind(), &FaultKind::TypeError);
    }

    #[test]
    fn test_fault_carries_traceback() {
        let mut instance = load(indoc! {"
            def ratio(a, b):
                return a / b

            def mean_ratio(a, b):
                r = ratio(a, b)
                return r
        "});
        let fault = call(&mut instance, "mean_ratio", vec![1.into(), 0.into()]).unwrap_err();

        assert_eq!(fault.kind(), &FaultKind::ZeroDivisionError);
        assert_eq!(fault.line(), Some(2));
        let functions: Vec<&str> = fault.traceback().iter().map(|f| f.function.as_str()).collect();
        assert_eq!(functions, vec!["ratio", "mean_ratio"]);
    }

    #[test]
    fn test_recursion_limit() {
        let unit = SourceUnit::inline(
            "subject",
            indoc! {"
                def down(n):
                    return down(n + 1)
            "},
        );
        let limits = ExecutionLimits {
            timeout: None,
            max_call_depth: 20,
        };
        let mut instance = Instance::load(&unit, limits, &mut NoTrace).unwrap();
        let fault = call(&mut instance, "down", vec![0.into()]).unwrap_err();
        assert_eq!(fault.kind(), &FaultKind::RecursionError);
        assert_eq!(fault.traceback().len(), 20);
    }

    #[test]
    fn test_deadline_interrupts_infinite_loop() {
        let unit = SourceUnit::inline(
            "subject",
            indoc! {"
                def spin():
                    while True:
                        pass
            "},
        );
        let limits = ExecutionLimits {
            timeout: Some(Duration::from_millis(20)),
            max_call_depth: 100,
        };
        let mut instance = Instance::load(&unit, limits, &mut NoTrace).unwrap();
        instance.arm_deadline();
        let fault = call(&mut instance, "spin", vec![]).unwrap_err();
        assert!(fault.is_timeout());
    }

    #[test]
    fn test_module_body_fault_is_load_error() {
        let unit = SourceUnit::inline("subject", "x = 1\ny = x / 0\n");
        let err = Instance::load(&unit, ExecutionLimits::default(), &mut NoTrace)
            .err()
            .unwrap();
        assert!(err.is_harness_error());
        match err {
            Error::Load { line, .. } => assert_eq!(line, Some(2)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_instances_do_not_share_state() {
        let source = indoc! {"
            seen = []

            def remember(x):
                seen.append(x)
                return len(seen)
        "};
        let mut first = load(source);
        assert_eq!(call(&mut first, "remember", vec![1.into()]).unwrap(), Value::Int(1));
        assert_eq!(call(&mut first, "remember", vec![2.into()]).unwrap(), Value::Int(2));

        let mut second = load(source);
        assert_eq!(call(&mut second, "remember", vec![3.into()]).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_script_reads_target_globals_without_tracing_itself() {
        let mut instance = load(indoc! {"
            LIMIT = 10

            def clamp(x):
                if x > LIMIT:
                    return LIMIT
                return x
        "});
        let tests = SourceUnit::inline(
            "subject_tests",
            indoc! {"
                def test_clamp():
                    assert clamp(50) == LIMIT
                    assert clamp(3) == 3
            "},
        );
        let mut lines = Lines::default();
        instance.run_script(&mut lines, &tests, "test_clamp").unwrap();

        assert_eq!(lines.of("subject"), vec![4, 5, 6]);
        assert!(instance.get("test_clamp").is_none());
    }

    #[test]
    fn test_script_import_failure() {
        let mut instance = load("def f():\n    return 1\n");
        let tests = SourceUnit::inline("broken_tests", "x = undefined_name\n");
        let fault = instance.run_script(&mut NoTrace, &tests, "test_f").unwrap_err();
        assert_eq!(fault.kind(), &FaultKind::ImportError);
        assert!(fault.message().contains("NameError"));
    }

    #[test]
    fn test_script_named_like_target_is_rejected() {
        let mut instance = load("def f():\n    return 1\n");
        let tests = SourceUnit::inline("subject", "def test_f():\n    assert f() == 1\n");
        let mut lines = Lines::default();
        let fault = instance.run_script(&mut lines, &tests, "test_f").unwrap_err();

        assert_eq!(fault.kind(), &FaultKind::ImportError);
        assert_eq!(fault.message(), "test module 'subject' shares its name with the target");
        assert!(lines.of("subject").is_empty());
    }

    #[test]
    fn test_list_aliasing_and_item_assignment() {
        let mut instance = load(indoc! {"
            def bump(xs):
                ys = xs
                ys[0] += 1
                ys += [9]
                return xs
        "});
        let result = call(&mut instance, "bump", vec![Value::list(vec![1.into()])]).unwrap();
        assert_eq!(result, Value::list(vec![2.into(), 9.into()]));
    }

    #[test]
    fn test_raise_and_assert_messages() {
        let mut instance = load(indoc! {"
            def check(x):
                if x < 0:
                    raise ValueError('negative: ' + str(x))
                assert x != 0, 'zero'
                return x
        "});
        let fault = call(&mut instance, "check", vec![(-1).into()]).unwrap_err();
        assert_eq!(fault.to_string(), "ValueError: negative: -1");
        let fault = call(&mut instance, "check", vec![0.into()]).unwrap_err();
        assert_eq!(fault.to_string(), "AssertionError: zero");
    }
}
