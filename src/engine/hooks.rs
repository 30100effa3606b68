//! Debugger-facing engine interfaces
//!
//! The engine exposes two installable callback slots (step and break), an
//! expression evaluator, a mirrored breakpoint registry and a cancellation
//! input. The debugger attaches through these seams only; the engine has no
//! knowledge of the session machinery behind them.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::common::Result;

use super::ast::Position;
use super::value::{EnvRef, FunctionRef, ObjectRef, Value};

/// How aggressively the engine should keep delivering step callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepMode {
    /// Only deliver break callbacks (hard breakpoints, `debugger` statements).
    #[default]
    None,
    /// Deliver at statements in the current or a shallower frame.
    Over,
    /// Deliver at every statement.
    Into,
    /// Deliver at statements in a strictly shallower frame.
    Out,
}

/// Why a break callback fired.
#[derive(Debug, Clone)]
pub enum BreakKind {
    /// A registered breakpoint location with a passing (or absent) condition.
    Breakpoint(Position),
    /// A `debugger;` statement.
    DebuggerStatement,
    /// An uncaught script error, delivered once before unwinding.
    Exception(String),
}

/// One call frame at a pause point, innermost first in [`DebugInformation`].
#[derive(Clone)]
pub struct FrameSnapshot {
    pub name: String,
    pub position: Position,
    pub env: EnvRef,
}

impl fmt::Debug for FrameSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.name, self.position)
    }
}

/// Snapshot of execution state handed to every callback.
#[derive(Debug, Clone)]
pub struct DebugInformation {
    /// Identifier of the executing script.
    pub source: String,
    /// Position of the statement about to execute.
    pub position: Position,
    /// Call stack, innermost frame first. Never empty.
    pub frames: Vec<FrameSnapshot>,
    /// Uncaught error message, for exception callbacks.
    pub exception: Option<String>,
}

/// Callback slots installed by the debugger.
///
/// Both callbacks must observe a pending cancellation request and abort by
/// returning the cancellation error, which unwinds out of the engine.
pub trait DebugHooks: Send + Sync {
    /// Delivered per the current [`StepMode`]; `breakpoint` names the
    /// registered breakpoint at this statement, if any, so breakpoint side
    /// effects run even while stepping.
    fn on_step(
        &self,
        info: &Arc<DebugInformation>,
        breakpoint: Option<Position>,
    ) -> Result<StepMode>;

    /// Delivered at hard breakpoint locations, `debugger` statements and
    /// uncaught errors when no step callback applies.
    fn on_break(&self, info: &Arc<DebugInformation>, kind: BreakKind) -> Result<StepMode>;
}

/// Expression evaluation inside a paused frame.
///
/// Used for breakpoint conditions, log messages, watch expressions, lazy
/// getter expansion and `setVariable` value parsing. Evaluation never
/// delivers debug callbacks.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, expression: &str, frame: &FrameSnapshot) -> Result<Value>;

    /// Invoke a lazy getter with `this` bound to its owning object.
    fn invoke_getter(&self, getter: &FunctionRef, owner: &ObjectRef) -> Result<Value>;
}

/// Cancellation input the debugger can signal from any thread.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
