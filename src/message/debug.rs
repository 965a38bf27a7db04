//! Debug commands and their responses
//!
//! Every [`DebugCmd`] variant is answered by exactly one [`DebugResponse`]
//! whose `kind` names the command and whose `id` is the request's id.

use serde::{Deserialize, Serialize};

use super::{next_message_id, ListVariable, MessageId, SymbolId, Variable};
use crate::common::{Error, ErrorInfo};

/// Thread addressed by suspend/resume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadTarget {
    All,
    Id(u64),
}

/// Debug command sent by the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DebugCmd {
    // === Breakpoints ===
    AddBreakpoints { breakpoints: Vec<SymbolId> },
    RemoveBreakpoints { breakpoints: Vec<SymbolId> },
    SetBreakpoints { breakpoints: Vec<SymbolId> },

    // === Execution Control ===
    SuspendThread { thread: ThreadTarget },
    ResumeThread { thread: ThreadTarget },
    StepOver { thread_id: u64 },
    StepInto { thread_id: u64 },
    StepOut { thread_id: u64 },

    // === State Inspection ===
    GetLocalVars {
        thread_id: u64,
        frame_idx: i64,
    },
    GetLocalListVals {
        thread_id: u64,
        frame_idx: i64,
        var_id: SymbolId,
        start_idx: i64,
        length: i64,
    },
    GetGlobalVars,
    GetGlobalListVals {
        var_id: SymbolId,
        start_idx: i64,
        length: i64,
    },
    GetThreadContexts,
    GetEntryPoints,
}

/// Name of a debug command, echoed by its response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugKind {
    AddBreakpoints,
    RemoveBreakpoints,
    SetBreakpoints,
    SuspendThread,
    ResumeThread,
    StepOver,
    StepInto,
    StepOut,
    GetLocalVars,
    GetLocalListVals,
    GetGlobalVars,
    GetGlobalListVals,
    GetThreadContexts,
    GetEntryPoints,
}

impl DebugCmd {
    pub fn kind(&self) -> DebugKind {
        match self {
            DebugCmd::AddBreakpoints { .. } => DebugKind::AddBreakpoints,
            DebugCmd::RemoveBreakpoints { .. } => DebugKind::RemoveBreakpoints,
            DebugCmd::SetBreakpoints { .. } => DebugKind::SetBreakpoints,
            DebugCmd::SuspendThread { .. } => DebugKind::SuspendThread,
            DebugCmd::ResumeThread { .. } => DebugKind::ResumeThread,
            DebugCmd::StepOver { .. } => DebugKind::StepOver,
            DebugCmd::StepInto { .. } => DebugKind::StepInto,
            DebugCmd::StepOut { .. } => DebugKind::StepOut,
            DebugCmd::GetLocalVars { .. } => DebugKind::GetLocalVars,
            DebugCmd::GetLocalListVals { .. } => DebugKind::GetLocalListVals,
            DebugCmd::GetGlobalVars => DebugKind::GetGlobalVars,
            DebugCmd::GetGlobalListVals { .. } => DebugKind::GetGlobalListVals,
            DebugCmd::GetThreadContexts => DebugKind::GetThreadContexts,
            DebugCmd::GetEntryPoints => DebugKind::GetEntryPoints,
        }
    }
}

/// Debug command with its correlation id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugRequest {
    pub id: MessageId,
    pub command: DebugCmd,
}

impl DebugRequest {
    pub fn new(command: DebugCmd) -> Self {
        Self {
            id: next_message_id(),
            command,
        }
    }
}

/// Typed payload of a successful debug response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DebugResult {
    Variables { variables: Vec<Variable> },
    ListValues { variable: ListVariable },
    EntryPoints { ids: Vec<SymbolId> },
}

/// Response to a [`DebugRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugResponse {
    /// Id of the request this answers
    pub id: MessageId,
    pub kind: DebugKind,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<DebugResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ErrorInfo>,
}

impl DebugResponse {
    /// Successful response with an optional payload
    pub fn success(id: MessageId, kind: DebugKind, result: Option<DebugResult>) -> Self {
        Self {
            id,
            kind,
            success: true,
            result,
            exception: None,
        }
    }

    /// Failed response carrying the error that caused it
    pub fn failure(id: MessageId, kind: DebugKind, error: &Error) -> Self {
        Self {
            id,
            kind,
            success: false,
            result: None,
            exception: Some(ErrorInfo::from(error)),
        }
    }
}
