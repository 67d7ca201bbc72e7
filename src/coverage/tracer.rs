//! Line-level execution trace scoped to one logical module

use crate::core::ModuleId;
use crate::target::LineObserver;
use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceState {
    Idle,
    Active,
    Stopped,
}

/// Records the lines of one module executed while the session is active.
///
/// Events from any other module (test modules, helpers) are ignored, so a
/// test can call freely between modules without polluting the spectrum.
#[derive(Debug, Clone)]
pub struct TraceSession {
    scope: ModuleId,
    state: TraceState,
    lines: BTreeSet<usize>,
}

impl TraceSession {
    pub fn new(scope: impl Into<ModuleId>) -> Self {
        Self {
            scope: scope.into(),
            state: TraceState::Idle,
            lines: BTreeSet::new(),
        }
    }

    pub fn scope(&self) -> &ModuleId {
        &self.scope
    }

    pub fn state(&self) -> TraceState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TraceState::Active
    }

    pub fn start(&mut self) {
        self.state = TraceState::Active;
    }

    pub fn stop(&mut self) {
        if self.state == TraceState::Active {
            self.state = TraceState::Stopped;
        }
    }

    /// Start tracing until the returned guard drops. The session is stopped
    /// on every exit path, including unwinding.
    pub fn begin(&mut self) -> ActiveTrace<'_> {
        self.start();
        ActiveTrace { session: self }
    }

    /// Lines recorded so far, ascending.
    pub fn extract(&self) -> BTreeSet<usize> {
        self.lines.clone()
    }

    /// Discard recorded lines and return to `Idle`.
    pub fn reset(&mut self) {
        self.lines.clear();
        self.state = TraceState::Idle;
    }
}

impl LineObserver for TraceSession {
    fn on_line(&mut self, module: &ModuleId, line: usize) {
        if self.state == TraceState::Active && *module == self.scope {
            self.lines.insert(line);
        }
    }
}

/// An active trace; stops its session on drop.
pub struct ActiveTrace<'s> {
    session: &'s mut TraceSession,
}

impl Deref for ActiveTrace<'_> {
    type Target = TraceSession;

    fn deref(&self) -> &TraceSession {
        self.session
    }
}

impl DerefMut for ActiveTrace<'_> {
    fn deref_mut(&mut self) -> &mut TraceSession {
        self.session
    }
}

impl Drop for ActiveTrace<'_> {
    fn drop(&mut self) {
        self.session.stop();
    }
}
