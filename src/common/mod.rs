//! Common utilities shared between the CLI and the runtime

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, ErrorInfo, Result};
