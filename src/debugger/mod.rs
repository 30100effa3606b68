//! Execution-control core
//!
//! The bidirectional rendezvous between the interpreter thread, which
//! re-enters through per-statement callbacks, and the client-facing command
//! channel. Ordering guarantees: a `Stopped` event precedes any variable
//! query, exactly one `Continued` separates adjacent `Stopped`s, and a
//! terminate is never followed by another `Stopped`.

pub mod breakpoints;
pub mod controller;
pub mod events;
pub mod registry;
pub mod rendezvous;
pub mod variables;

pub use breakpoints::{Breakpoint, BreakpointTable, HitCondition, HitOutcome};
pub use controller::{SessionConfig, SessionController};
pub use events::{DebugEvent, DebuggerState, StepIntent, StopReason};
pub use registry::{ScriptInfo, ScriptRegistry};
pub use variables::{DebugScope, ValueInfo, VariableContainer, VariableStore};
