//! script-dap - a Debug Adapter Protocol server for an embedded script engine
//!
//! Bridges a small embedded script engine to DAP clients over a framed TCP
//! byte stream, exposing script execution as a pausable, steppable,
//! breakpoint-controlled session.

pub mod common;
pub mod dap;
pub mod debugger;
pub mod engine;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use debugger::{DebugEvent, SessionConfig, SessionController, StopReason};
pub use engine::{Engine, Position};
