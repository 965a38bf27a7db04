use serde::{Deserialize, Serialize};

use super::{next_message_id, MessageId, ProgramException, SymbolId, Variable};

/// Control state of a worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreadState {
    Running,
    Suspended,
    Finished,
    Error,
}

impl ThreadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ThreadState::Finished | ThreadState::Error)
    }
}

/// One entry of a reconstructed call stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStackItem {
    /// Variable-stack frame opened by this call, usable as the `frame_idx`
    /// of a local-variable request. Block scopes also open frames, so this
    /// can be larger than the item's position in the call stack.
    pub frame_idx: usize,
    pub symbol_id: SymbolId,
}

impl CallStackItem {
    pub fn new(frame_idx: usize, symbol_id: SymbolId) -> Self {
        Self {
            frame_idx,
            symbol_id,
        }
    }
}

/// Variables of one variable-stack frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarStackFrame {
    pub idx: usize,
    pub variables: Vec<Variable>,
}

/// Thread state notification sent to the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub id: MessageId,
    pub thread_id: u64,
    pub state: ThreadState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub call_stack: Vec<CallStackItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step: Option<SymbolId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ProgramException>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<VarStackFrame>,
}

impl ThreadSnapshot {
    /// State-only snapshot
    pub fn state_only(thread_id: u64, state: ThreadState) -> Self {
        Self {
            id: next_message_id(),
            thread_id,
            state,
            call_stack: Vec::new(),
            next_step: None,
            exception: None,
            variables: Vec::new(),
        }
    }

    /// Snapshot carrying the call stack and the step the thread stopped at
    pub fn with_call_stack(
        thread_id: u64,
        state: ThreadState,
        call_stack: Vec<CallStackItem>,
        next_step: SymbolId,
    ) -> Self {
        Self {
            call_stack,
            next_step: (!next_step.is_none()).then_some(next_step),
            ..Self::state_only(thread_id, state)
        }
    }

    /// Terminal snapshot, with the exception that ended the thread if any
    pub fn terminated(
        thread_id: u64,
        call_stack: Vec<CallStackItem>,
        exception: Option<ProgramException>,
    ) -> Self {
        let state = if exception.is_some() {
            ThreadState::Error
        } else {
            ThreadState::Finished
        };
        Self {
            call_stack,
            exception,
            ..Self::state_only(thread_id, state)
        }
    }
}
