//! Boundary between the controller and the running program
//!
//! The controller side pushes into and pops from four bounded queues with
//! timeouts. Two dedicated threads process what the controller sent: one
//! for messages (debug commands, text input, events) and one for responses
//! (answers to text output and simulator commands).
//!
//! Output commands whose `println` already completed (after a disconnect)
//! are skipped when popped instead of being removed from the queue.

use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::dispatch::DebugCmdProcessor;
use super::executor::ProgramExecutor;
use super::queues::{MessageQueues, Outbox};
use crate::agent::{IoAgent, SimulatorAgent};
use crate::common::{config::Config, Result};
use crate::debugger::{Debugger, NotificationSink, ProgramDebugger};
use crate::message::{Notification, Response, TextIoCmd};

/// Item popped from one of the two outbound queues
#[derive(Debug, Clone)]
pub enum Outbound {
    Message(Notification),
    Response(Response),
}

pub struct ProgramHandler {
    queues: Arc<MessageQueues>,
    push_timeout: Duration,
    pop_timeout: Duration,
    debugger: Arc<ProgramDebugger>,
    dispatcher: DebugCmdProcessor,
    executor: ProgramExecutor,
    io: Arc<IoAgent>,
    simulator: Arc<SimulatorAgent>,
    connected: AtomicBool,
    /// Popped but never delivered; served before the queues
    carryover: Mutex<VecDeque<Outbound>>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    processors: Mutex<Vec<JoinHandle<()>>>,
}

impl ProgramHandler {
    pub fn new(config: &Config) -> Arc<Self> {
        let queues = Arc::new(MessageQueues::new(config));
        let push_timeout = config.timeouts.push();
        let sink: Arc<dyn NotificationSink> =
            Arc::new(Outbox::new(&queues.outbound_msgs, push_timeout));

        let debugger = Arc::new(ProgramDebugger::new(sink.clone()));
        let io = Arc::new(IoAgent::new(
            sink.clone(),
            config.queues.max_input_text,
            config.runtime.text_output_enabled,
        ));
        let simulator = Arc::new(SimulatorAgent::new(sink));
        let executor = ProgramExecutor::new(debugger.clone(), io.clone(), simulator.clone());

        Arc::new(Self {
            queues,
            push_timeout,
            pop_timeout: config.timeouts.pop(),
            dispatcher: DebugCmdProcessor::new(debugger.clone()),
            debugger,
            executor,
            io,
            simulator,
            connected: AtomicBool::new(false),
            carryover: Mutex::new(VecDeque::new()),
            shutdown_tx: Mutex::new(None),
            processors: Mutex::new(Vec::new()),
        })
    }

    pub fn debugger(&self) -> &Arc<ProgramDebugger> {
        &self.debugger
    }

    pub fn executor(&self) -> &ProgramExecutor {
        &self.executor
    }

    /// Start the two inbound processing threads
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        *self.shutdown_tx.lock() = Some(shutdown_tx);

        let msg_thread = {
            let handler = self.clone();
            let shutdown_rx = shutdown_rx.clone();
            std::thread::Builder::new()
                .name("msg-processor".into())
                .spawn(move || handler.process_messages(shutdown_rx))?
        };
        let resp_thread = {
            let handler = self.clone();
            std::thread::Builder::new()
                .name("resp-processor".into())
                .spawn(move || handler.process_responses(shutdown_rx))?
        };

        self.processors.lock().extend([msg_thread, resp_thread]);
        tracing::info!("Program handler started");
        Ok(())
    }

    /// Stop the processing threads and release every blocked agent call
    pub fn shutdown(&self) {
        // Dropping the sender disconnects the shutdown channel
        self.shutdown_tx.lock().take();
        let processors: Vec<_> = self.processors.lock().drain(..).collect();
        for processor in processors {
            if processor.join().is_err() {
                tracing::error!("Processing thread panicked");
            }
        }
        self.io.cancel();
        self.simulator.cancel();
        self.debugger.set_breakpoints(Vec::new());
        self.debugger.resume_all();
        tracing::info!("Program handler stopped");
    }

    // === Controller side ===

    /// Queue a message for the program. False if the queue stayed full.
    pub fn send_msg_to_script(&self, msg: Notification) -> bool {
        self.queues.inbound_msgs.push(msg, self.push_timeout)
    }

    /// Queue a response for the program. False if the queue stayed full.
    pub fn send_resp_to_script(&self, resp: Response) -> bool {
        self.queues.inbound_resps.push(resp, self.push_timeout)
    }

    /// Next message from the program, or `None` after the pop timeout
    pub fn recv_msg_from_script(&self) -> Option<Notification> {
        let deadline = Instant::now() + self.pop_timeout;
        loop {
            let msg = self
                .queues
                .outbound_msgs
                .pop(deadline.saturating_duration_since(Instant::now()))?;
            if !self.is_stale_output(&msg) {
                return Some(msg);
            }
        }
    }

    /// Next response from the program, or `None` after the pop timeout
    pub fn recv_resp_from_script(&self) -> Option<Response> {
        self.queues.outbound_resps.pop(self.pop_timeout)
    }

    /// Queue a response for the controller, e.g. to a request that never
    /// reached the program. False if the queue stayed full.
    pub fn reply_to_controller(&self, resp: Response) -> bool {
        self.queues.outbound_resps.push(resp, self.push_timeout)
    }

    /// Next item for the controller, waiting at most `timeout`.
    ///
    /// Items handed back with [`requeue`](Self::requeue) come first.
    pub fn recv_outbound(&self, timeout: Duration) -> Option<Outbound> {
        let deadline = Instant::now() + timeout;
        loop {
            let carried = self.carryover.lock().pop_front();
            let item = match carried {
                Some(item) => item,
                None => self.pop_outbound(deadline.saturating_duration_since(Instant::now()))?,
            };
            match &item {
                Outbound::Message(msg) if self.is_stale_output(msg) => continue,
                _ => return Some(item),
            }
        }
    }

    /// Return items taken with [`recv_outbound`](Self::recv_outbound) that
    /// never reached a controller. They keep their order and precede
    /// everything still queued.
    pub fn requeue(&self, items: Vec<Outbound>) {
        if items.is_empty() {
            return;
        }
        tracing::debug!(count = items.len(), "Keeping undelivered items for the next controller");
        let mut carryover = self.carryover.lock();
        for item in items.into_iter().rev() {
            carryover.push_front(item);
        }
    }

    fn pop_outbound(&self, timeout: Duration) -> Option<Outbound> {
        let msgs = self.queues.outbound_msgs.receiver();
        let resps = self.queues.outbound_resps.receiver();
        select! {
            recv(msgs) -> msg => msg.ok().map(Outbound::Message),
            recv(resps) -> resp => resp.ok().map(Outbound::Response),
            default(timeout) => None,
        }
    }

    /// Output command nobody waits for any more
    fn is_stale_output(&self, msg: &Notification) -> bool {
        match msg {
            Notification::TextIo(TextIoCmd::OutputText { id, .. }) => {
                let stale = !self.io.is_output_pending(*id);
                if stale {
                    tracing::debug!(id, "Skipping output of a completed println");
                }
                stale
            }
            _ => false,
        }
    }

    /// A controller attached: forward text output again
    pub fn connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.io.enable_text_output();
        tracing::info!("Controller connected");
    }

    /// The controller went away: unblock every waiting `println`.
    ///
    /// Their queued output commands become stale and are never delivered.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.io.disable_text_output();
        tracing::info!("Controller disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    // === Processing threads ===

    fn process_messages(&self, shutdown: Receiver<()>) {
        let inbound = self.queues.inbound_msgs.receiver();
        loop {
            select! {
                recv(inbound) -> msg => match msg {
                    Ok(msg) => self.process_message(msg),
                    Err(_) => break,
                },
                recv(shutdown) -> _ => break,
            }
        }
        tracing::debug!("Message processor exiting");
    }

    fn process_responses(&self, shutdown: Receiver<()>) {
        let inbound = self.queues.inbound_resps.receiver();
        loop {
            select! {
                recv(inbound) -> resp => match resp {
                    Ok(resp) => self.process_response(resp),
                    Err(_) => break,
                },
                recv(shutdown) -> _ => break,
            }
        }
        tracing::debug!("Response processor exiting");
    }

    fn process_message(&self, msg: Notification) {
        let id = msg.id();
        match msg {
            Notification::Debug(request) => {
                let response = self.dispatcher.handle(request);
                self.reply_to_controller(Response::Debug(response));
            }
            Notification::TextIo(cmd) => {
                if let Some(response) = self.io.accept_input(cmd) {
                    self.reply_to_controller(Response::TextIo(response));
                }
            }
            Notification::Event(event) => {
                if let Err(e) = self.executor.fire_event(&event) {
                    tracing::error!(id, event = %event.name, error = %e, "Failed to start event handler");
                }
            }
            Notification::ThreadContext(_) | Notification::Simulator(_) => {
                tracing::warn!(id, "Unexpected message from controller");
            }
        }
    }

    fn process_response(&self, resp: Response) {
        match resp {
            Response::TextIo(resp) => {
                self.io.notify(resp);
            }
            Response::Simulator(resp) => {
                self.simulator.notify(resp);
            }
            Response::Debug(resp) => {
                tracing::warn!(id = resp.id, "Unexpected debug response from controller");
            }
        }
    }
}
