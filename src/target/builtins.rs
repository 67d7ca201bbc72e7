//! Builtin functions visible to every target module

use super::ast::{BinOp, CmpOp};
use super::fault::{Fault, FaultKind};
use super::value::{
    binary, compare, format_float, resolve_index, RangeValue, Value, ValueIter,
};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Abs,
    Bool,
    Float,
    Int,
    Len,
    Max,
    Min,
    Print,
    Range,
    Str,
    Sum,
}

impl Builtin {
    pub const ALL: [Builtin; 11] = [
        Self::Abs,
        Self::Bool,
        Self::Float,
        Self::Int,
        Self::Len,
        Self::Max,
        Self::Min,
        Self::Print,
        Self::Range,
        Self::Str,
        Self::Sum,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Bool => "bool",
            Self::Float => "float",
            Self::Int => "int",
            Self::Len => "len",
            Self::Max => "max",
            Self::Min => "min",
            Self::Print => "print",
            Self::Range => "range",
            Self::Str => "str",
            Self::Sum => "sum",
        }
    }

    pub fn call(self, args: &[Value]) -> Result<Value, Fault> {
        match self {
            Self::Abs => {
                let [value] = exactly::<1>(self, args)?;
                match value {
                    Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                    Value::Int(i) => i.checked_abs().map(Value::Int).ok_or_else(|| {
                        Fault::new(FaultKind::OverflowError, "integer result out of 64-bit range")
                    }),
                    Value::Float(f) => Ok(Value::Float(f.abs())),
                    other => Err(Fault::type_error(format!(
                        "bad operand type for abs(): '{}'",
                        other.type_name()
                    ))),
                }
            }
            Self::Bool => match args {
                [] => Ok(Value::Bool(false)),
                [value] => Ok(Value::Bool(value.truthy())),
                _ => Err(arity(self, "at most 1", args.len())),
            },
            Self::Float => match args {
                [] => Ok(Value::Float(0.0)),
                [value] => to_float(value),
                _ => Err(arity(self, "at most 1", args.len())),
            },
            Self::Int => match args {
                [] => Ok(Value::Int(0)),
                [value] => to_int(value),
                _ => Err(arity(self, "at most 1", args.len())),
            },
            Self::Len => {
                let [value] = exactly::<1>(self, args)?;
                let len = match value {
                    Value::Str(s) => s.chars().count(),
                    Value::List(items) => items.borrow().len(),
                    Value::Range(range) => range.len(),
                    other => {
                        return Err(Fault::type_error(format!(
                            "object of type '{}' has no len()",
                            other.type_name()
                        )))
                    }
                };
                Ok(Value::Int(len as i64))
            }
            Self::Max => extremum(self, args, CmpOp::Gt),
            Self::Min => extremum(self, args, CmpOp::Lt),
            Self::Print => {
                let line = args.iter().map(Value::to_text).collect::<Result<Vec<_>, _>>()?;
                tracing::debug!(target: "faultmap::target", "{}", line.join(" "));
                Ok(Value::None)
            }
            Self::Range => range(args),
            Self::Str => match args {
                [] => Ok(Value::str("")),
                [value] => Ok(Value::Str(value.to_text()?.into())),
                _ => Err(arity(self, "at most 1", args.len())),
            },
            Self::Sum => {
                let (iterable, start) = match args {
                    [iterable] => (iterable, Value::Int(0)),
                    [iterable, start] => (iterable, start.clone()),
                    _ => return Err(arity(self, "1 or 2", args.len())),
                };
                if matches!(start, Value::Str(_)) {
                    return Err(Fault::type_error(
                        "sum() can't sum strings [use ''.join(seq) instead]",
                    ));
                }
                ValueIter::new(iterable)?
                    .try_fold(start, |total, item| binary(BinOp::Add, &total, &item))
            }
        }
    }
}

fn arity(builtin: Builtin, expected: &str, got: usize) -> Fault {
    Fault::type_error(format!(
        "{}() takes {expected} argument(s) ({got} given)",
        builtin.name()
    ))
}

fn exactly<const N: usize>(builtin: Builtin, args: &[Value]) -> Result<&[Value; N], Fault> {
    args.try_into()
        .map_err(|_| arity(builtin, &format!("exactly {N}"), args.len()))
}

fn to_int(value: &Value) -> Result<Value, Fault> {
    match value {
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) if f.is_finite() && f.trunc().abs() < 9.2e18 => {
            Ok(Value::Int(f.trunc() as i64))
        }
        Value::Float(f) => Err(Fault::new(
            if f.is_nan() {
                FaultKind::ValueError
            } else {
                FaultKind::OverflowError
            },
            format!("cannot convert float {} to integer", format_float(*f)),
        )),
        Value::Str(s) => s
            .trim()
            .replace('_', "")
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| {
                Fault::new(
                    FaultKind::ValueError,
                    format!("invalid literal for int() with base 10: {}", value.repr()),
                )
            }),
        other => Err(Fault::type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(value: &Value) -> Result<Value, Fault> {
    match value {
        Value::Bool(b) => Ok(Value::Float(f64::from(u8::from(*b)))),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Str(s) => {
            let text = s.trim().to_ascii_lowercase();
            let parsed = match text.as_str() {
                "inf" | "+inf" | "infinity" => Some(f64::INFINITY),
                "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
                "nan" => Some(f64::NAN),
                other => other.parse::<f64>().ok(),
            };
            parsed.map(Value::Float).ok_or_else(|| {
                Fault::new(
                    FaultKind::ValueError,
                    format!("could not convert string to float: {}", value.repr()),
                )
            })
        }
        other => Err(Fault::type_error(format!(
            "float() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn range(args: &[Value]) -> Result<Value, Fault> {
    let ints: Vec<i64> = args
        .iter()
        .map(|arg| {
            arg.as_int().ok_or_else(|| {
                Fault::type_error(format!(
                    "'{}' object cannot be interpreted as an integer",
                    arg.type_name()
                ))
            })
        })
        .collect::<Result<_, _>>()?;

    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(arity(Builtin::Range, "1 to 3", args.len())),
    };
    if step == 0 {
        return Err(Fault::new(
            FaultKind::ValueError,
            "range() arg 3 must not be zero",
        ));
    }
    Ok(Value::Range(RangeValue { start, stop, step }))
}

/// `min`/`max` over either one iterable or several arguments. An item
/// replaces the best so far only when it compares strictly past it, so ties
/// keep the first item.
fn extremum(builtin: Builtin, args: &[Value], op: CmpOp) -> Result<Value, Fault> {
    let mut iter: Box<dyn Iterator<Item = Value>> = match args {
        [] => return Err(arity(builtin, "at least 1", 0)),
        [iterable] => Box::new(ValueIter::new(iterable)?),
        many => Box::new(many.iter().cloned()),
    };

    let Some(mut best) = iter.next() else {
        return Err(Fault::new(
            FaultKind::ValueError,
            format!("{}() arg is an empty sequence", builtin.name()),
        ));
    };
    for item in iter {
        if compare(op, &item, &best)? {
            best = item;
        }
    }
    Ok(best)
}

/// Method call on a list or string value.
pub fn call_method(object: &Value, name: &str, args: Vec<Value>) -> Result<Value, Fault> {
    match object {
        Value::List(items) => list_method(items, name, args),
        Value::Str(s) => str_method(s, name, args),
        other => Err(no_attribute(other, name)),
    }
}

fn no_attribute(object: &Value, name: &str) -> Fault {
    Fault::new(
        FaultKind::AttributeError,
        format!("'{}' object has no attribute '{name}'", object.type_name()),
    )
}

fn method_arity(owner: &str, name: &str, expected: usize, got: usize) -> Fault {
    Fault::type_error(format!(
        "{owner}.{name}() takes {expected} argument(s) ({got} given)"
    ))
}

fn position_of(items: &RefCell<Vec<Value>>, needle: &Value) -> Result<Option<usize>, Fault> {
    for (position, item) in items.borrow().iter().enumerate() {
        if item.try_eq(needle)? {
            return Ok(Some(position));
        }
    }
    Ok(None)
}

/// Stable merge sort that only asks `<`, as Python's `list.sort` does.
/// Unordered numbers such as NaN stay put; mixed types raise `TypeError`.
fn merge_sort(mut items: Vec<Value>) -> Result<Vec<Value>, Fault> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items)?;
    let mut right = merge_sort(right)?.into_iter().peekable();

    let mut merged = Vec::with_capacity(left.len() + right.len());
    for item in left {
        while let Some(next) = right.peek() {
            if !compare(CmpOp::Lt, next, &item)? {
                break;
            }
            merged.extend(right.next());
        }
        merged.push(item);
    }
    merged.extend(right);
    Ok(merged)
}

fn list_method(items: &Rc<RefCell<Vec<Value>>>, name: &str, args: Vec<Value>) -> Result<Value, Fault> {
    let expect = |expected: usize| -> Result<(), Fault> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(method_arity("list", name, expected, args.len()))
        }
    };

    match name {
        "append" => {
            expect(1)?;
            items.borrow_mut().extend(args);
            Ok(Value::None)
        }
        "extend" => {
            expect(1)?;
            let extra: Vec<Value> = ValueIter::new(&args[0])?.collect();
            items.borrow_mut().extend(extra);
            Ok(Value::None)
        }
        "insert" => {
            expect(2)?;
            let mut items = items.borrow_mut();
            let len = items.len() as i64;
            let Some(raw) = args[0].as_int() else {
                return Err(Fault::type_error("list indices must be integers"));
            };
            let position = if raw < 0 { (raw + len).max(0) } else { raw.min(len) };
            items.insert(position as usize, args[1].clone());
            Ok(Value::None)
        }
        "pop" => {
            let mut items = items.borrow_mut();
            if items.is_empty() {
                return Err(Fault::new(FaultKind::IndexError, "pop from empty list"));
            }
            let position = match args.as_slice() {
                [] => items.len() - 1,
                [index] => resolve_index(index, items.len(), "pop")?,
                _ => return Err(method_arity("list", name, 1, args.len())),
            };
            Ok(items.remove(position))
        }
        "remove" => {
            expect(1)?;
            let position = position_of(items, &args[0])?.ok_or_else(|| {
                Fault::new(FaultKind::ValueError, "list.remove(x): x not in list")
            })?;
            items.borrow_mut().remove(position);
            Ok(Value::None)
        }
        "index" => {
            expect(1)?;
            position_of(items, &args[0])?
                .map(|position| Value::Int(position as i64))
                .ok_or_else(|| {
                    Fault::new(FaultKind::ValueError, format!("{} is not in list", args[0].repr()))
                })
        }
        "count" => {
            expect(1)?;
            let mut count = 0;
            for item in items.borrow().iter() {
                if item.try_eq(&args[0])? {
                    count += 1;
                }
            }
            Ok(Value::Int(count))
        }
        "reverse" => {
            expect(0)?;
            items.borrow_mut().reverse();
            Ok(Value::None)
        }
        "sort" => {
            expect(0)?;
            let snapshot = items.borrow().clone();
            *items.borrow_mut() = merge_sort(snapshot)?;
            Ok(Value::None)
        }
        "clear" => {
            expect(0)?;
            items.borrow_mut().clear();
            Ok(Value::None)
        }
        "copy" => {
            expect(0)?;
            Ok(Value::list(items.borrow().clone()))
        }
        _ => Err(no_attribute(&Value::List(Rc::clone(items)), name)),
    }
}

fn str_arg<'v>(name: &str, value: &'v Value) -> Result<&'v str, Fault> {
    match value {
        Value::Str(s) => Ok(&**s),
        other => Err(Fault::type_error(format!(
            "str.{name}() argument must be str, not {}",
            other.type_name()
        ))),
    }
}

fn str_method(s: &Rc<str>, name: &str, args: Vec<Value>) -> Result<Value, Fault> {
    let text: &str = s;
    let string = |value: String| Ok(Value::Str(value.into()));

    match (name, args.as_slice()) {
        ("upper", []) => string(text.to_uppercase()),
        ("lower", []) => string(text.to_lowercase()),
        ("strip", []) => string(text.trim().to_string()),
        ("lstrip", []) => string(text.trim_start().to_string()),
        ("rstrip", []) => string(text.trim_end().to_string()),
        ("isdigit", []) => Ok(Value::Bool(
            !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()),
        )),
        ("startswith", [prefix]) => Ok(Value::Bool(text.starts_with(str_arg(name, prefix)?))),
        ("endswith", [suffix]) => Ok(Value::Bool(text.ends_with(str_arg(name, suffix)?))),
        ("find", [needle]) => {
            let needle = str_arg(name, needle)?;
            let found = text
                .find(needle)
                .map(|byte| text[..byte].chars().count() as i64)
                .unwrap_or(-1);
            Ok(Value::Int(found))
        }
        ("count", [needle]) => {
            let needle = str_arg(name, needle)?;
            let count = if needle.is_empty() {
                text.chars().count() + 1
            } else {
                text.matches(needle).count()
            };
            Ok(Value::Int(count as i64))
        }
        ("replace", [old, new]) => string(text.replace(str_arg(name, old)?, str_arg(name, new)?)),
        ("split", []) => Ok(Value::list(
            text.split_whitespace().map(Value::str).collect(),
        )),
        ("split", [separator]) => {
            let separator = str_arg(name, separator)?;
            if separator.is_empty() {
                return Err(Fault::new(FaultKind::ValueError, "empty separator"));
            }
            Ok(Value::list(text.split(separator).map(Value::str).collect()))
        }
        ("join", [iterable]) => {
            let parts = ValueIter::new(iterable)?
                .map(|part| match part {
                    Value::Str(part) => Ok(part.to_string()),
                    other => Err(Fault::type_error(format!(
                        "sequence item: expected str instance, {} found",
                        other.type_name()
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            string(parts.join(text))
        }
        (
            "upper" | "lower" | "strip" | "lstrip" | "rstrip" | "isdigit" | "startswith"
            | "endswith" | "find" | "count" | "replace" | "split" | "join",
            _,
        ) => Err(Fault::type_error(format!(
            "str.{name}() got {} argument(s)",
            args.len()
        ))),
        _ => Err(no_attribute(&Value::Str(Rc::clone(s)), name)),
    }
}
