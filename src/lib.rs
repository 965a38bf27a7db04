//! Block Runtime - execution environment and debugger core for block programs
//!
//! Program code runs on native worker threads and cooperatively pauses at
//! instrumented steps. A controller drives the debugger through debug
//! commands and receives thread snapshots, text output and simulator
//! commands as notifications.

pub mod agent;
pub mod cli;
pub mod commands;
pub mod common;
pub mod debugger;
pub mod message;
pub mod runtime;
pub mod sync;

// Re-export commonly used types for tests
pub use common::{Error, ErrorInfo, Result};
pub use debugger::{DebugInstrumentation, Debugger, ProgramDebugger};
pub use runtime::{ProgramHandler, Worker};
