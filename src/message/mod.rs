//! Messages exchanged between the runtime and its controller
//!
//! Two sum types cover all traffic: [`Notification`] for messages that start
//! an exchange and [`Response`] for the answers. Both directions use them.

mod debug;
mod exception;
mod io;
mod symbol;
mod thread;
mod variable;

pub use debug::{
    DebugCmd, DebugKind, DebugRequest, DebugResponse, DebugResult, ThreadTarget,
};
pub use exception::ProgramException;
pub use io::{ProgramEvent, SimulatorCmd, SimulatorResp, TextIoCmd, TextIoResp, PROGRAM_START};
pub use symbol::SymbolId;
pub use thread::{CallStackItem, ThreadSnapshot, ThreadState, VarStackFrame};
pub use variable::{ListSlice, ListVariable, ScalarVariable, Variable};

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Correlation id of a message
pub type MessageId = u64;

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Next process-wide unique message id
pub fn next_message_id() -> MessageId {
    NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Message that starts an exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum Notification {
    ThreadContext(ThreadSnapshot),
    TextIo(TextIoCmd),
    Simulator(SimulatorCmd),
    Event(ProgramEvent),
    Debug(DebugRequest),
}

impl Notification {
    pub fn id(&self) -> MessageId {
        match self {
            Notification::ThreadContext(s) => s.id,
            Notification::TextIo(c) => c.id(),
            Notification::Simulator(c) => c.id,
            Notification::Event(e) => e.id,
            Notification::Debug(r) => r.id,
        }
    }
}

/// Answer to a [`Notification`], carrying the id it answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum Response {
    Debug(DebugResponse),
    TextIo(TextIoResp),
    Simulator(SimulatorResp),
}

impl Response {
    pub fn id(&self) -> MessageId {
        match self {
            Response::Debug(r) => r.id,
            Response::TextIo(r) => r.id(),
            Response::Simulator(r) => r.id,
        }
    }
}
