//! Debug Adapter Protocol (DAP) implementation
//!
//! This module implements the server side of DAP: the wire codec, the
//! message types and the TCP listener translating client requests into
//! session controller operations.

pub mod codec;
pub mod server;
pub mod types;

pub use server::serve;
pub use types::*;
