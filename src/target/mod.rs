//! Loading and executing target programs.
//!
//! Targets are written in a small Python subset. Source is parsed with
//! tree-sitter, lowered to an owned tree and run by a tree-walking evaluator
//! that reports each executed line to a [`LineObserver`].

pub mod ast;
pub mod builtins;
pub mod eval;
pub mod fault;
pub mod parser;
pub mod source;
pub mod value;

pub use eval::{ExecutionLimits, Instance, LineObserver, NoTrace};
pub use fault::{Fault, FaultKind, FrameInfo};
pub use source::{SourceOrigin, SourceUnit};
pub use value::Value;
