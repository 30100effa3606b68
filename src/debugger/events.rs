//! Client-visible debug events and session enums

use std::fmt;
use std::sync::Arc;

use crate::engine::DebugInformation;

/// Why execution stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Entry,
    Step,
    Pause,
    Breakpoint,
    DebuggerStatement,
    Exception,
}

impl StopReason {
    /// The DAP `stopped` event reason string.
    pub fn as_dap_str(&self) -> &'static str {
        match self {
            StopReason::Entry => "entry",
            StopReason::Step => "step",
            StopReason::Pause => "pause",
            StopReason::Breakpoint | StopReason::DebuggerStatement => "breakpoint",
            StopReason::Exception => "exception",
        }
    }
}

/// The step directive set by a resuming client command, consumed on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepIntent {
    #[default]
    None,
    Over,
    Into,
    Out,
}

/// Debugger state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebuggerState {
    /// Launched, interpreter held until the client signals readiness.
    WaitingForUi,
    /// Released, first statement not yet reached.
    Entering,
    Running,
    /// A pause request is pending; takes effect at the next statement.
    Pausing,
    Stepping,
    Terminating,
}

impl fmt::Display for DebuggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitingForUi => write!(f, "waiting-for-ui"),
            Self::Entering => write!(f, "entering"),
            Self::Running => write!(f, "running"),
            Self::Pausing => write!(f, "pausing"),
            Self::Stepping => write!(f, "stepping"),
            Self::Terminating => write!(f, "terminating"),
        }
    }
}

/// Events emitted by the session controller, serialized to DAP by the
/// transport layer.
#[derive(Debug, Clone)]
pub enum DebugEvent {
    Stopped {
        reason: StopReason,
        info: Arc<DebugInformation>,
    },
    Continued,
    /// A logpoint fired; execution did not stop.
    LogPoint {
        message: String,
        info: Arc<DebugInformation>,
    },
    /// Execution completed normally.
    Done,
    /// Execution was terminated by the client.
    Cancelled,
    /// An uncaught fault ended the session; carries the first fault.
    Faulted(String),
}
