//! Error types for the debug adapter
//!
//! State-machine and registry errors are local to the offending request and
//! reported as error responses; engine faults are fatal to the session.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the debug adapter
#[derive(Error, Debug)]
pub enum Error {
    // === State Machine Errors ===
    #[error("Cannot {action} while session is {state}")]
    InvalidState { action: String, state: String },

    #[error("Debugger is already attached to the engine")]
    AlreadyAttached,

    // === Script Registry Errors ===
    #[error("Source '{0}' is already registered")]
    DuplicateSource(String),

    #[error("Source '{0}' is not registered")]
    UnknownSource(String),

    #[error("No breakpointable location at or after {source_id}:{line}:{column}")]
    NoBreakpointLocation {
        source_id: String,
        line: u32,
        column: u32,
    },

    // === Variable Store Errors ===
    #[error("Unknown variable reference {0}")]
    UnknownHandle(i64),

    #[error("Variable '{0}' is read-only")]
    ReadOnly(String),

    // === Engine Errors ===
    #[error("Parse error at {line}:{column}: {message}")]
    Parse {
        message: String,
        line: u32,
        column: u32,
    },

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Script error: {0}")]
    Engine(String),

    #[error("Execution cancelled")]
    Cancelled,

    // === DAP Protocol Errors ===
    #[error("DAP protocol error: {0}")]
    DapProtocol(String),

    #[error("Unsupported DAP request '{0}'")]
    UnsupportedRequest(String),

    // === Configuration Errors ===
    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid state error
    pub fn invalid_state(action: &str, state: impl std::fmt::Display) -> Self {
        Self::InvalidState {
            action: action.to_string(),
            state: state.to_string(),
        }
    }

    /// Create a no-breakpoint-location error
    pub fn no_breakpoint_location(source: &str, line: u32, column: u32) -> Self {
        Self::NoBreakpointLocation {
            source_id: source.to_string(),
            line,
            column,
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self::Parse {
            message: message.into(),
            line,
            column,
        }
    }

    /// True for errors that terminate the session rather than a single request
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Engine(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_message() {
        let err = Error::invalid_state("resume", "running");
        assert_eq!(err.to_string(), "Cannot resume while session is running");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Engine("boom".into()).is_fatal());
        assert!(!Error::Cancelled.is_fatal());
        assert!(!Error::UnknownHandle(7).is_fatal());
    }
}
