//! Runtime faults raised inside a target or a test.
//!
//! A fault is data, not an error: the runner turns it into a failing
//! outcome and keeps going.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    AssertionError,
    AttributeError,
    ImportError,
    IndexError,
    MemoryError,
    NameError,
    OverflowError,
    RecursionError,
    RuntimeError,
    TimeoutError,
    TypeError,
    ValueError,
    ZeroDivisionError,
    /// A Rust panic inside a native test procedure
    Panic,
    /// Any other exception name raised by target code
    Other(String),
}

impl FaultKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "AssertionError" => Self::AssertionError,
            "AttributeError" => Self::AttributeError,
            "ImportError" => Self::ImportError,
            "IndexError" => Self::IndexError,
            "MemoryError" => Self::MemoryError,
            "NameError" => Self::NameError,
            "OverflowError" => Self::OverflowError,
            "RecursionError" => Self::RecursionError,
            "RuntimeError" => Self::RuntimeError,
            "TimeoutError" => Self::TimeoutError,
            "TypeError" => Self::TypeError,
            "ValueError" => Self::ValueError,
            "ZeroDivisionError" => Self::ZeroDivisionError,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::AssertionError => "AssertionError",
            Self::AttributeError => "AttributeError",
            Self::ImportError => "ImportError",
            Self::IndexError => "IndexError",
            Self::MemoryError => "MemoryError",
            Self::NameError => "NameError",
            Self::OverflowError => "OverflowError",
            Self::RecursionError => "RecursionError",
            Self::RuntimeError => "RuntimeError",
            Self::TimeoutError => "TimeoutError",
            Self::TypeError => "TypeError",
            Self::ValueError => "ValueError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::Panic => "panic",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One frame of a traceback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub module: String,
    pub function: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    kind: FaultKind,
    message: String,
    /// Innermost frame first
    traceback: Vec<FrameInfo>,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            traceback: Vec::new(),
        }
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(FaultKind::AssertionError, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(FaultKind::TypeError, message)
    }

    pub fn timeout(limit: Duration) -> Self {
        Self::new(
            FaultKind::TimeoutError,
            format!("test exceeded deadline of {} ms", limit.as_millis()),
        )
    }

    pub fn kind(&self) -> &FaultKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn traceback(&self) -> &[FrameInfo] {
        &self.traceback
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == FaultKind::TimeoutError
    }

    /// Line of the innermost frame, where the fault was raised.
    pub fn line(&self) -> Option<usize> {
        self.traceback.first().map(|frame| frame.line)
    }

    pub(crate) fn push_frame(&mut self, module: &str, function: &str, line: usize) {
        self.traceback.push(FrameInfo {
            module: module.to_string(),
            function: function.to_string(),
            line,
        });
    }

    /// Python-style traceback text, outermost call first.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.traceback.is_empty() {
            out.push_str("Traceback (most recent call last):\n");
            for frame in self.traceback.iter().rev() {
                out.push_str(&format!(
                    "  File \"{}\", line {}, in {}\n",
                    frame.module, frame.line, frame.function
                ));
            }
        }
        out.push_str(&self.to_string());
        out
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for Fault {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_orders_outermost_first() {
        let mut fault = Fault::new(FaultKind::ZeroDivisionError, "division by zero");
        fault.push_frame("subject", "ratio", 7);
        fault.push_frame("subject_tests", "test_ratio", 3);

        assert_eq!(
            fault.render(),
            "Traceback (most recent call last):\n  \
             File \"subject_tests\", line 3, in test_ratio\n  \
             File \"subject\", line 7, in ratio\n\
             ZeroDivisionError: division by zero"
        );
        assert_eq!(fault.line(), Some(7));
    }

    #[test]
    fn test_render_without_frames() {
        let fault = Fault::assertion("");
        assert_eq!(fault.render(), "AssertionError");
        assert_eq!(fault.line(), None);
    }

    #[test]
    fn test_kind_names_round_trip() {
        for name in ["ValueError", "TimeoutError", "KeyError"] {
            assert_eq!(FaultKind::from_name(name).name(), name);
        }
        assert_eq!(FaultKind::from_name("KeyError"), FaultKind::Other("KeyError".into()));
    }

    #[test]
    fn test_timeout_message() {
        let fault = Fault::timeout(Duration::from_millis(250));
        assert!(fault.is_timeout());
        assert_eq!(fault.to_string(), "TimeoutError: test exceeded deadline of 250 ms");
    }
}
