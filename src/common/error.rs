//! Error types for the block runtime
//!
//! Debugger errors are locally recoverable: the dispatcher turns them into
//! failed responses carrying an [`ErrorInfo`] instead of propagating them.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the runtime
#[derive(Error, Debug)]
pub enum Error {
    // === Debugger Errors ===
    #[error("Thread {0} not found")]
    NoSuchThread(u64),

    #[error("Thread {0} is not suspended")]
    ThreadNotSuspended(u64),

    #[error("No such symbol: {0}")]
    NoSuchSymbol(String),

    #[error("Index {index} is out of bounds (size {len})")]
    IndexOutOfBounds { index: i64, len: usize },

    // === Agent Errors ===
    #[error("Agency failed: {0}")]
    AgencyFailed(String),

    #[error("Message queue '{0}' is full or closed")]
    QueueClosed(&'static str),

    // === Controller Connection Errors ===
    #[error("Runtime is not running. Start it with 'block-runtime serve'")]
    RuntimeNotRunning,

    #[error("Failed to connect to runtime: {0}")]
    RuntimeConnectionFailed(#[source] io::Error),

    #[error("Runtime communication error: {0}")]
    RuntimeCommunication(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // === Program Errors ===
    #[error("Program error: {0}")]
    Program(#[from] crate::message::ProgramException),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

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

    // === Remote Errors ===
    #[error("Remote error [{code}]: {message}")]
    Remote { code: String, message: String },

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an agency failed error for a named operation
    pub fn agency_failed(operation: &str) -> Self {
        Self::AgencyFailed(format!("{} failed", operation))
    }

    /// Create an index out of bounds error
    pub fn index_out_of_bounds(index: i64, len: usize) -> Self {
        Self::IndexOutOfBounds { index, len }
    }
}

/// Serializable error attached to failed responses
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl From<&Error> for ErrorInfo {
    fn from(e: &Error) -> Self {
        let code = match e {
            Error::NoSuchThread(_) => "NO_SUCH_THREAD",
            Error::ThreadNotSuspended(_) => "THREAD_NOT_SUSPENDED",
            Error::NoSuchSymbol(_) => "NO_SUCH_SYMBOL",
            Error::IndexOutOfBounds { .. } => "INDEX_OUT_OF_BOUNDS",
            Error::AgencyFailed(_) => "AGENCY_FAILED",
            Error::Program(_) => "PROGRAM_ERROR",
            Error::InvalidRequest(_) => "INVALID_REQUEST",
            Error::Remote { code, .. } => code.as_str(),
            _ => "INTERNAL_ERROR",
        }
        .to_string();

        Self {
            code,
            message: e.to_string(),
        }
    }
}

impl From<ErrorInfo> for Error {
    fn from(e: ErrorInfo) -> Self {
        // Only the symbol payload survives the trip as text
        match e.code.as_str() {
            "NO_SUCH_SYMBOL" => Error::NoSuchSymbol(
                e.message
                    .strip_prefix("No such symbol: ")
                    .unwrap_or(&e.message)
                    .to_string(),
            ),
            "AGENCY_FAILED" => Error::AgencyFailed(e.message),
            _ => Error::Remote {
                code: e.code,
                message: e.message,
            },
        }
    }
}
