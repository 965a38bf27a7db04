use std::sync::Arc;

use super::correlator::CommandCorrelator;
use crate::common::{Error, Result};
use crate::debugger::NotificationSink;
use crate::message::{Notification, SimulatorCmd, SimulatorResp};

/// Sends string commands to the simulator and waits for the results
pub struct SimulatorAgent {
    sink: Arc<dyn NotificationSink>,
    correlator: CommandCorrelator<SimulatorResp>,
}

impl SimulatorAgent {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            correlator: CommandCorrelator::new(),
        }
    }

    /// Run `components` as one simulator command and return its result
    pub fn send_cmd(&self, components: &[&str]) -> Result<Vec<String>> {
        let cmd = SimulatorCmd::new(components);
        let id = cmd.id;
        let sink = &self.sink;
        match self
            .correlator
            .call(id, move || sink.send(Notification::Simulator(cmd)))
        {
            Some(resp) if resp.success => Ok(resp.components),
            _ => Err(Error::agency_failed("send_cmd")),
        }
    }

    pub fn notify(&self, resp: SimulatorResp) -> bool {
        self.correlator.notify(resp)
    }

    /// Release every pending command without an answer
    pub fn cancel(&self) {
        self.correlator.cancel_all();
    }
}
