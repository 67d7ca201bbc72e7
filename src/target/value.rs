//! Runtime values and operator semantics

use super::ast::{BinOp, CmpOp, FunctionDef};
use super::builtins::Builtin;
use super::fault::{Fault, FaultKind};
use crate::core::ModuleId;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Largest sequence a single operation may produce.
pub const MAX_SEQUENCE_LEN: usize = 10_000_000;

/// Deepest list nesting walked when comparing or rendering values.
pub const MAX_NESTING: usize = 1000;

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Range(RangeValue),
    Function(Rc<Function>),
    Builtin(Builtin),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeValue {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl RangeValue {
    pub fn len(&self) -> usize {
        let (start, stop, step) = (self.start as i128, self.stop as i128, self.step as i128);
        let span = if step > 0 {
            (stop - start + step - 1) / step
        } else {
            (start - stop - step - 1) / -step
        };
        span.max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, value: i64) -> bool {
        let in_bounds = if self.step > 0 {
            self.start <= value && value < self.stop
        } else {
            self.stop < value && value <= self.start
        };
        in_bounds && (value as i128 - self.start as i128) % self.step as i128 == 0
    }
}

/// A user-defined function closed over the globals of its module.
pub struct Function {
    pub def: Rc<FunctionDef>,
    pub module: ModuleId,
    pub globals: Globals,
    pub defaults: Vec<Option<Value>>,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}.{}>", self.module, self.def.name)
    }
}

/// Module-level namespace. A test module's globals chain to the target's.
#[derive(Clone, Default)]
pub struct Globals(Rc<RefCell<GlobalScope>>);

#[derive(Default)]
struct GlobalScope {
    vars: HashMap<String, Value>,
    parent: Option<Globals>,
}

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child_of(parent: &Globals) -> Self {
        Self(Rc::new(RefCell::new(GlobalScope {
            vars: HashMap::new(),
            parent: Some(parent.clone()),
        })))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let scope = self.0.borrow();
        match scope.vars.get(name) {
            Some(value) => Some(value.clone()),
            None => scope.parent.as_ref().and_then(|parent| parent.get(name)),
        }
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().vars.insert(name.into(), value);
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.borrow().vars.keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop every binding. Functions hold their globals, so this is what
    /// releases an instance's reference cycles.
    pub fn clear(&self) {
        let vars = std::mem::take(&mut self.0.borrow_mut().vars);
        drop(vars);
    }
}

impl Value {
    pub fn str(value: &str) -> Self {
        Self::Str(value.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Range(_) => "range",
            Self::Function(_) => "function",
            Self::Builtin(_) => "builtin_function_or_method",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.borrow().is_empty(),
            Self::Range(range) => !range.is_empty(),
            Self::Function(_) | Self::Builtin(_) => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<Number> {
        match self {
            Self::Bool(b) => Some(Number::Int(i64::from(*b))),
            Self::Int(i) => Some(Number::Int(*i)),
            Self::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Python `==` for host code. A comparison nested too deeply to finish
    /// counts as unequal.
    pub fn py_eq(&self, other: &Value) -> bool {
        self.try_eq(other).unwrap_or(false)
    }

    /// Python `==`; lists nested beyond [`MAX_NESTING`] raise `RecursionError`.
    pub fn try_eq(&self, other: &Value) -> Result<bool, Fault> {
        self.eq_at(other, 0)
    }

    fn eq_at(&self, other: &Value, depth: usize) -> Result<bool, Fault> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return Ok(a.cmp_numeric(b) == Some(Ordering::Equal));
        }
        let equal = match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                if depth >= MAX_NESTING {
                    return Err(nesting_exceeded("in comparison"));
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    if !x.eq_at(y, depth + 1)? {
                        return Ok(false);
                    }
                }
                true
            }
            (Self::Range(a), Self::Range(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            _ => false,
        };
        Ok(equal)
    }

    /// Python `repr()`. Lists nested beyond [`MAX_NESTING`] are elided.
    pub fn repr(&self) -> String {
        self.lenient(true)
    }

    /// Python `str()`; lists nested beyond [`MAX_NESTING`] raise
    /// `RecursionError`.
    pub fn to_text(&self) -> Result<String, Fault> {
        let mut out = String::new();
        self.render(&mut out, false, &mut Vec::new(), true)?;
        Ok(out)
    }

    fn lenient(&self, quoted: bool) -> String {
        let mut out = String::new();
        // Never fails when not strict.
        let _ = self.render(&mut out, quoted, &mut Vec::new(), false);
        out
    }

    /// Append the text of `self` to `out`. `open` holds the lists currently
    /// being rendered; meeting one again prints `[...]`.
    fn render(
        &self,
        out: &mut String,
        quoted: bool,
        open: &mut Vec<*const RefCell<Vec<Value>>>,
        strict: bool,
    ) -> Result<(), Fault> {
        match self {
            Self::None => out.push_str("None"),
            Self::Bool(true) => out.push_str("True"),
            Self::Bool(false) => out.push_str("False"),
            Self::Int(i) => out.push_str(&i.to_string()),
            Self::Float(x) => out.push_str(&format_float(*x)),
            Self::Str(s) if quoted => {
                out.push('\'');
                out.push_str(&s.replace('\\', "\\\\").replace('\'', "\\'"));
                out.push('\'');
            }
            Self::Str(s) => out.push_str(s),
            Self::List(items) => {
                let id = Rc::as_ptr(items);
                if open.contains(&id) {
                    out.push_str("[...]");
                    return Ok(());
                }
                if open.len() >= MAX_NESTING {
                    if strict {
                        return Err(nesting_exceeded("while getting the repr of an object"));
                    }
                    out.push_str("[...]");
                    return Ok(());
                }
                open.push(id);
                out.push('[');
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.render(out, true, open, strict)?;
                }
                out.push(']');
                open.pop();
            }
            Self::Range(r) if r.step == 1 => out.push_str(&format!("range({}, {})", r.start, r.stop)),
            Self::Range(r) => out.push_str(&format!("range({}, {}, {})", r.start, r.stop, r.step)),
            Self::Function(func) => out.push_str(&format!("<function {}>", func.def.name)),
            Self::Builtin(b) => out.push_str(&format!("<built-in function {}>", b.name())),
        }
        Ok(())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

/// Python `str()`, eliding lists nested beyond [`MAX_NESTING`]
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lenient(false))
    }
}

/// Equality follows Python `==`, so `Value::Int(1) == Value::Float(1.0)`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.py_eq(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::list(items)
    }
}

pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        "nan".to_string()
    } else if x.is_infinite() {
        (if x > 0.0 { "inf" } else { "-inf" }).to_string()
    } else if x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn to_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    fn cmp_numeric(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.to_f64().partial_cmp(&b.to_f64()),
        }
    }
}

fn overflow() -> Fault {
    Fault::new(FaultKind::OverflowError, "integer result out of 64-bit range")
}

fn unsupported_operands(op: &str, left: &Value, right: &Value) -> Fault {
    Fault::type_error(format!(
        "unsupported operand type(s) for {op}: '{}' and '{}'",
        left.type_name(),
        right.type_name()
    ))
}

fn repeat<T: Clone>(items: &[T], times: i64) -> Result<Vec<T>, Fault> {
    let times = usize::try_from(times).unwrap_or(0);
    if items.len().saturating_mul(times) > MAX_SEQUENCE_LEN {
        return Err(Fault::new(FaultKind::MemoryError, "sequence repetition too large"));
    }
    Ok(items.iter().cloned().cycle().take(items.len() * times).collect())
}

fn floor_div(a: i64, b: i64) -> Result<i64, Fault> {
    let q = a.checked_div(b).ok_or_else(overflow)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

fn floor_mod(a: i64, b: i64) -> Result<i64, Fault> {
    let r = a.checked_rem(b).ok_or_else(overflow)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

fn float_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
        r + b
    } else {
        r
    }
}

/// Binary arithmetic with Python semantics.
pub fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value, Fault> {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return numeric(op, a, b);
    }

    match (op, left, right) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => {
            Ok(Value::Str(format!("{a}{b}").into()))
        }
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            let mut joined = a.borrow().clone();
            joined.extend(b.borrow().iter().cloned());
            Ok(Value::list(joined))
        }
        (BinOp::Mul, Value::Str(s), n) | (BinOp::Mul, n, Value::Str(s)) if n.as_int().is_some() => {
            let chars: Vec<char> = s.chars().collect();
            let repeated: String = repeat(&chars, n.as_int().unwrap_or(0))?.into_iter().collect();
            Ok(Value::Str(repeated.into()))
        }
        (BinOp::Mul, Value::List(items), n) | (BinOp::Mul, n, Value::List(items))
            if n.as_int().is_some() =>
        {
            let repeated = repeat(items.borrow().as_slice(), n.as_int().unwrap_or(0))?;
            Ok(Value::list(repeated))
        }
        _ => Err(unsupported_operands(op.symbol(), left, right)),
    }
}

fn numeric(op: BinOp, a: Number, b: Number) -> Result<Value, Fault> {
    if let (Number::Int(a), Number::Int(b)) = (a, b) {
        return match op {
            BinOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Div => {
                if b == 0 {
                    Err(Fault::new(FaultKind::ZeroDivisionError, "division by zero"))
                } else {
                    Ok(Value::Float(a as f64 / b as f64))
                }
            }
            BinOp::FloorDiv | BinOp::Mod if b == 0 => Err(Fault::new(
                FaultKind::ZeroDivisionError,
                "integer division or modulo by zero",
            )),
            BinOp::FloorDiv => floor_div(a, b).map(Value::Int),
            BinOp::Mod => floor_mod(a, b).map(Value::Int),
            BinOp::Pow if b < 0 => {
                if a == 0 {
                    Err(Fault::new(
                        FaultKind::ZeroDivisionError,
                        "0.0 cannot be raised to a negative power",
                    ))
                } else {
                    Ok(Value::Float((a as f64).powf(b as f64)))
                }
            }
            BinOp::Pow => u32::try_from(b)
                .ok()
                .and_then(|exp| a.checked_pow(exp))
                .map(Value::Int)
                .ok_or_else(overflow),
        };
    }

    let (x, y) = (a.to_f64(), b.to_f64());
    let zero_division = |what: &str| Err(Fault::new(FaultKind::ZeroDivisionError, what.to_string()));
    match op {
        BinOp::Add => Ok(Value::Float(x + y)),
        BinOp::Sub => Ok(Value::Float(x - y)),
        BinOp::Mul => Ok(Value::Float(x * y)),
        BinOp::Div if y == 0.0 => zero_division("float division by zero"),
        BinOp::Div => Ok(Value::Float(x / y)),
        BinOp::FloorDiv if y == 0.0 => zero_division("float floor division by zero"),
        BinOp::FloorDiv => Ok(Value::Float((x / y).floor())),
        BinOp::Mod if y == 0.0 => zero_division("float modulo"),
        BinOp::Mod => Ok(Value::Float(float_mod(x, y))),
        BinOp::Pow if x == 0.0 && y < 0.0 => {
            zero_division("0.0 cannot be raised to a negative power")
        }
        BinOp::Pow => Ok(Value::Float(x.powf(y))),
    }
}

pub fn negate(value: &Value) -> Result<Value, Fault> {
    match value.as_number() {
        Some(Number::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
        Some(Number::Float(f)) => Ok(Value::Float(-f)),
        None => Err(Fault::type_error(format!(
            "bad operand type for unary -: '{}'",
            value.type_name()
        ))),
    }
}

pub fn positive(value: &Value) -> Result<Value, Fault> {
    match value.as_number() {
        Some(Number::Int(i)) => Ok(Value::Int(i)),
        Some(Number::Float(f)) => Ok(Value::Float(f)),
        None => Err(Fault::type_error(format!(
            "bad operand type for unary +: '{}'",
            value.type_name()
        ))),
    }
}

/// One link of a comparison chain.
pub fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, Fault> {
    compare_at(op, left, right, 0)
}

fn compare_at(op: CmpOp, left: &Value, right: &Value, depth: usize) -> Result<bool, Fault> {
    match op {
        CmpOp::Eq => left.eq_at(right, depth),
        CmpOp::NotEq => left.eq_at(right, depth).map(|equal| !equal),
        CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE => order(op, left, right, depth),
        CmpOp::In => contains(right, left, depth),
        CmpOp::NotIn => contains(right, left, depth).map(|found| !found),
        CmpOp::Is => Ok(identical(left, right)),
        CmpOp::IsNot => Ok(!identical(left, right)),
    }
}

/// Python `<`, `<=`, `>`, `>=`. Numbers that do not order (NaN) compare
/// false; other unordered types raise `TypeError`.
fn order(op: CmpOp, left: &Value, right: &Value, depth: usize) -> Result<bool, Fault> {
    let accept = |ordering: Ordering| match op {
        CmpOp::Lt => ordering.is_lt(),
        CmpOp::LtE => ordering.is_le(),
        CmpOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    };

    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return Ok(a.cmp_numeric(b).is_some_and(accept));
    }
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(accept(a.cmp(b))),
        (Value::List(a), Value::List(b)) => {
            if Rc::ptr_eq(a, b) {
                return Ok(accept(Ordering::Equal));
            }
            if depth >= MAX_NESTING {
                return Err(nesting_exceeded("in comparison"));
            }
            let (a, b) = (a.borrow(), b.borrow());
            for (x, y) in a.iter().zip(b.iter()) {
                if !x.eq_at(y, depth + 1)? {
                    return order(op, x, y, depth + 1);
                }
            }
            Ok(accept(a.len().cmp(&b.len())))
        }
        _ => Err(Fault::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn contains(container: &Value, item: &Value, depth: usize) -> Result<bool, Fault> {
    match (container, item) {
        (Value::List(items), _) => {
            for candidate in items.borrow().iter() {
                if candidate.eq_at(item, depth)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(&**needle)),
        (Value::Str(_), other) => Err(Fault::type_error(format!(
            "'in <string>' requires string as left operand, not {}",
            other.type_name()
        ))),
        (Value::Range(range), other) => Ok(other.as_int().is_some_and(|i| range.contains(i))),
        (other, _) => Err(Fault::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn nesting_exceeded(context: &str) -> Fault {
    Fault::new(
        FaultKind::RecursionError,
        format!("maximum recursion depth exceeded {context}"),
    )
}

fn identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
        (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
        (Value::Builtin(a), Value::Builtin(b)) => a == b,
        _ => false,
    }
}

/// Iteration over a snapshot of a value.
pub enum ValueIter {
    Range { next: i64, stop: i64, step: i64 },
    Items { items: Vec<Value>, index: usize },
}

impl ValueIter {
    pub fn new(value: &Value) -> Result<Self, Fault> {
        match value {
            Value::Range(range) => Ok(Self::Range {
                next: range.start,
                stop: range.stop,
                step: range.step,
            }),
            Value::List(items) => Ok(Self::Items {
                items: items.borrow().clone(),
                index: 0,
            }),
            Value::Str(s) => Ok(Self::Items {
                items: s.chars().map(|c| Value::Str(c.to_string().into())).collect(),
                index: 0,
            }),
            other => Err(Fault::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            Self::Range { next, stop, step } => {
                let more = if *step > 0 { *next < *stop } else { *next > *stop };
                if !more {
                    return None;
                }
                let current = *next;
                match next.checked_add(*step) {
                    Some(advanced) => *next = advanced,
                    None => *next = *stop,
                }
                Some(Value::Int(current))
            }
            Self::Items { items, index } => {
                let item = items.get(*index).cloned();
                *index += 1;
                item
            }
        }
    }
}

/// Resolve a possibly negative index against a length.
pub fn resolve_index(index: &Value, len: usize, what: &str) -> Result<usize, Fault> {
    let Some(raw) = index.as_int() else {
        return Err(Fault::type_error(format!(
            "{what} indices must be integers, not {}",
            index.type_name()
        )));
    };
    let len_i = len as i64;
    let resolved = if raw < 0 { raw + len_i } else { raw };
    if resolved < 0 || resolved >= len_i {
        return Err(Fault::new(FaultKind::IndexError, format!("{what} index out of range")));
    }
    Ok(resolved as usize)
}
