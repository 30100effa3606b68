//! The embedded script engine
//!
//! A small JavaScript-like language: lexer, recursive-descent parser and a
//! tree-walking interpreter. The debugger drives execution exclusively
//! through the interfaces in [`hooks`]: installable step/break callbacks, a
//! mirrored breakpoint registry, an expression evaluator and a cancellation
//! token.

pub mod ast;
pub mod hooks;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::{Position, Program};
pub use hooks::{
    BreakKind, CancelToken, DebugHooks, DebugInformation, Evaluator, FrameSnapshot, StepMode,
};
pub use interp::{stringify, Engine, ExprEvaluator};
pub use parser::{parse, parse_expression};
pub use value::{EnvRef, ObjectRef, PropertyDescriptor, Value};
