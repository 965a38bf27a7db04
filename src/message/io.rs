//! Text IO, simulator and event messages

use serde::{Deserialize, Serialize};

use super::{next_message_id, MessageId};

/// Name of the event fired when a program starts
pub const PROGRAM_START: &str = "PROGRAM_START";

/// Text IO commands. Output flows to the controller, input flows back in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextIoCmd {
    OutputText { id: MessageId, text: String },
    InputText { id: MessageId, text: String },
}

impl TextIoCmd {
    pub fn output(text: impl Into<String>) -> Self {
        TextIoCmd::OutputText {
            id: next_message_id(),
            text: text.into(),
        }
    }

    pub fn input(text: impl Into<String>) -> Self {
        TextIoCmd::InputText {
            id: next_message_id(),
            text: text.into(),
        }
    }

    pub fn id(&self) -> MessageId {
        match self {
            TextIoCmd::OutputText { id, .. } | TextIoCmd::InputText { id, .. } => *id,
        }
    }
}

/// Responses to [`TextIoCmd`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextIoResp {
    OutputText {
        id: MessageId,
        success: bool,
        text: String,
    },
    InputText {
        id: MessageId,
        success: bool,
        text: String,
    },
}

impl TextIoResp {
    pub fn id(&self) -> MessageId {
        match self {
            TextIoResp::OutputText { id, .. } | TextIoResp::InputText { id, .. } => *id,
        }
    }

    pub fn success(&self) -> bool {
        match self {
            TextIoResp::OutputText { success, .. } | TextIoResp::InputText { success, .. } => {
                *success
            }
        }
    }
}

/// String command for the simulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorCmd {
    pub id: MessageId,
    pub components: Vec<String>,
}

impl SimulatorCmd {
    pub fn new(components: &[&str]) -> Self {
        Self {
            id: next_message_id(),
            components: components.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorResp {
    pub id: MessageId,
    pub success: bool,
    #[serde(default)]
    pub components: Vec<String>,
}

/// Event that starts a program-defined handler on a new worker thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramEvent {
    pub id: MessageId,
    pub name: String,
}

impl ProgramEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: next_message_id(),
            name: name.into(),
        }
    }
}
