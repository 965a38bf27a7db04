//! Text input and output between program code and the controller

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::Arc;

use super::correlator::CommandCorrelator;
use crate::common::{Error, Result};
use crate::debugger::NotificationSink;
use crate::message::{MessageId, Notification, TextIoCmd, TextIoResp};

pub struct IoAgent {
    sink: Arc<dyn NotificationSink>,
    /// Held while an output command is registered and enqueued
    output_enabled: Mutex<bool>,
    correlator: CommandCorrelator<TextIoResp>,
    input_tx: Sender<String>,
    input_rx: Receiver<String>,
}

impl IoAgent {
    pub fn new(sink: Arc<dyn NotificationSink>, input_capacity: usize, output_enabled: bool) -> Self {
        let (input_tx, input_rx) = bounded(input_capacity);
        Self {
            sink,
            output_enabled: Mutex::new(output_enabled),
            correlator: CommandCorrelator::new(),
            input_tx,
            input_rx,
        }
    }

    /// Print a line on the controller and wait until it was shown.
    ///
    /// Does nothing while text output is disabled.
    pub fn println(&self, text: &str) -> Result<()> {
        let enabled = self.output_enabled.lock();
        if !*enabled {
            return Ok(());
        }

        let cmd = TextIoCmd::output(format!("{}\n", text));
        let id = cmd.id();
        let sink = &self.sink;
        let response = self.correlator.call(id, move || {
            let sent = sink.send(Notification::TextIo(cmd));
            drop(enabled);
            sent
        });

        match response {
            Some(TextIoResp::OutputText { success: true, .. }) => Ok(()),
            other => {
                tracing::debug!(id, ?other, "Text output was not acknowledged");
                Err(Error::agency_failed("println"))
            }
        }
    }

    /// Take the next line of input, blocking until one arrives
    pub fn scanln(&self) -> Result<String> {
        self.input_rx
            .recv()
            .map_err(|_| Error::agency_failed("scanln"))
    }

    /// Buffer text sent by the controller. Returns the response to send back.
    pub fn accept_input(&self, cmd: TextIoCmd) -> Option<TextIoResp> {
        match cmd {
            TextIoCmd::InputText { id, text } => {
                let success = match self.input_tx.try_send(text.clone()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(id, "Input buffer full, dropping text");
                        false
                    }
                    Err(TrySendError::Disconnected(_)) => false,
                };
                Some(TextIoResp::InputText { id, success, text })
            }
            TextIoCmd::OutputText { id, .. } => {
                tracing::warn!(id, "Ignoring output command sent to the runtime");
                None
            }
        }
    }

    /// Deliver the controller's answer to an output command
    pub fn notify(&self, resp: TextIoResp) -> bool {
        self.correlator.notify(resp)
    }

    /// True while the `println` that sent output command `id` still waits
    pub fn is_output_pending(&self, id: MessageId) -> bool {
        self.correlator.is_awaiting(id)
    }

    /// Stop forwarding output and complete every pending `println`
    pub fn disable_text_output(&self) {
        let mut enabled = self.output_enabled.lock();
        *enabled = false;
        self.correlator.resolve_pending(|id| {
            Some(TextIoResp::OutputText {
                id,
                success: true,
                text: String::new(),
            })
        });
    }

    pub fn enable_text_output(&self) {
        *self.output_enabled.lock() = true;
    }

    pub fn is_text_output_enabled(&self) -> bool {
        *self.output_enabled.lock()
    }

    /// Release every pending `println` without an answer
    pub fn cancel(&self) {
        self.correlator.cancel_all();
    }
}
