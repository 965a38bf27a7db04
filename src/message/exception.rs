use serde::{Deserialize, Serialize};

use super::{next_message_id, CallStackItem, MessageId};

/// Error raised by executed program code, as reported to the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ProgramException {
    pub id: MessageId,
    pub thread_id: u64,
    pub message: String,
    pub call_stack: Vec<CallStackItem>,
    /// Message of the underlying cause when it could not be carried as a
    /// program exception itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ProgramException {
    pub fn new(thread_id: u64, message: impl Into<String>, call_stack: Vec<CallStackItem>) -> Self {
        Self {
            id: next_message_id(),
            thread_id,
            message: message.into(),
            call_stack,
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}
