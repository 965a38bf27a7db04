//! Program executor: one native worker thread per fired event
//!
//! Handlers are registered per event name together with the symbol of their
//! entry point. A worker always reports its end to the debugger exactly once,
//! whether the handler returns, fails or panics.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::agent::{IoAgent, SimulatorAgent};
use crate::common::{Error, Result};
use crate::debugger::{DebugInstrumentation, ThreadContext, VarAccessor};
use crate::message::{ProgramEvent, ProgramException, SymbolId, PROGRAM_START};

/// Program code run on a worker thread
pub type EventHandler = Arc<dyn Fn(&Worker) -> Result<()> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    entry: SymbolId,
    handler: EventHandler,
}

/// Handle given to program code running on a worker thread
pub struct Worker {
    thread_id: u64,
    context: Arc<ThreadContext>,
    debugger: Arc<dyn DebugInstrumentation>,
    io: Arc<IoAgent>,
    simulator: Arc<SimulatorAgent>,
}

impl Worker {
    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    pub fn context(&self) -> &Arc<ThreadContext> {
        &self.context
    }

    /// Pause point before executing the block `step`
    pub fn step(&self, step: impl Into<SymbolId>) {
        self.debugger.conditional_wait(&step.into());
    }

    /// Run `body` as a call to `symbol`.
    ///
    /// The frame stays on the stack when `body` fails so the error reports
    /// where it happened.
    pub fn call<T>(
        &self,
        symbol: impl Into<SymbolId>,
        body: impl FnOnce(&Worker) -> Result<T>,
    ) -> Result<T> {
        self.context.push_call(symbol.into());
        let result = body(self);
        if result.is_ok() {
            self.context.pop_call();
        }
        result
    }

    /// Declare a variable in the innermost frame
    pub fn declare(&self, var: Arc<dyn VarAccessor>) {
        self.context.declare(var);
    }

    /// Record an error message to report if the thread fails
    pub fn error_message(&self, message: impl Into<String>) {
        self.context.add_error_message(message);
    }

    /// Error raised by program code at the current call stack
    pub fn exception(&self, message: impl Into<String>) -> Error {
        Error::Program(ProgramException::new(
            self.thread_id,
            message,
            self.context.call_stack(),
        ))
    }

    pub fn io(&self) -> &IoAgent {
        &self.io
    }

    pub fn simulator(&self) -> &SimulatorAgent {
        &self.simulator
    }
}

pub struct ProgramExecutor {
    handlers: RwLock<BTreeMap<String, Vec<Registration>>>,
    debugger: Arc<dyn DebugInstrumentation>,
    io: Arc<IoAgent>,
    simulator: Arc<SimulatorAgent>,
    next_worker: AtomicU64,
}

impl ProgramExecutor {
    pub fn new(
        debugger: Arc<dyn DebugInstrumentation>,
        io: Arc<IoAgent>,
        simulator: Arc<SimulatorAgent>,
    ) -> Self {
        Self {
            handlers: RwLock::new(BTreeMap::new()),
            debugger,
            io,
            simulator,
            next_worker: AtomicU64::new(1),
        }
    }

    /// Register `handler` for `event`, entered through the symbol `entry`
    pub fn register_handler(
        &self,
        event: &str,
        entry: impl Into<SymbolId>,
        handler: impl Fn(&Worker) -> Result<()> + Send + Sync + 'static,
    ) {
        let entry = entry.into();
        let entry_points = {
            let mut handlers = self.handlers.write();
            handlers
                .entry(event.to_string())
                .or_default()
                .push(Registration {
                    entry: entry.clone(),
                    handler: Arc::new(handler),
                });
            handlers
                .values()
                .flatten()
                .map(|r| r.entry.clone())
                .collect::<Vec<_>>()
        };
        tracing::debug!(event, %entry, "Registered event handler");
        self.debugger.set_entry_point_ids(entry_points);
    }

    /// Start one worker thread per handler registered for `event`
    pub fn fire_event(&self, event: &ProgramEvent) -> Result<Vec<JoinHandle<()>>> {
        let registrations = self
            .handlers
            .read()
            .get(&event.name)
            .cloned()
            .unwrap_or_default();
        if registrations.is_empty() {
            tracing::debug!(event = %event.name, "No handler for event");
        }

        let mut workers = Vec::with_capacity(registrations.len());
        for registration in registrations {
            let n = self.next_worker.fetch_add(1, Ordering::Relaxed);
            let debugger = self.debugger.clone();
            let io = self.io.clone();
            let simulator = self.simulator.clone();
            let handle = std::thread::Builder::new()
                .name(format!("worker-{}", n))
                .spawn(move || run_worker(registration, debugger, io, simulator))?;
            workers.push(handle);
        }
        Ok(workers)
    }

    /// Fire the program start event
    pub fn start(&self) -> Result<Vec<JoinHandle<()>>> {
        tracing::info!("Starting program");
        self.fire_event(&ProgramEvent::new(PROGRAM_START))
    }
}

fn run_worker(
    registration: Registration,
    debugger: Arc<dyn DebugInstrumentation>,
    io: Arc<IoAgent>,
    simulator: Arc<SimulatorAgent>,
) {
    let context = ThreadContext::new();
    context.push_call(registration.entry);
    let thread_id = debugger.notify_thread_start(context.clone());
    let worker = Worker {
        thread_id,
        context,
        debugger: debugger.clone(),
        io,
        simulator,
    };

    match catch_unwind(AssertUnwindSafe(|| (registration.handler)(&worker))) {
        Ok(Ok(())) => debugger.notify_thread_end(),
        Ok(Err(e)) => debugger.notify_thread_end_with_error(&e),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(thread_id, %message, "Worker panicked");
            debugger.notify_thread_end_with_error(&Error::Internal(format!(
                "worker panicked: {}",
                message
            )));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debugger::ProgramDebugger;
    use crate::message::{Notification, ThreadState};
    use crossbeam_channel::{unbounded, Receiver};

    fn executor() -> (ProgramExecutor, Arc<ProgramDebugger>, Receiver<Notification>) {
        let (tx, rx) = unbounded::<Notification>();
        let sink = Arc::new(tx);
        let debugger = Arc::new(ProgramDebugger::new(sink.clone()));
        let io = Arc::new(IoAgent::new(sink.clone(), 4, false));
        let simulator = Arc::new(SimulatorAgent::new(sink));
        (
            ProgramExecutor::new(debugger.clone(), io, simulator),
            debugger,
            rx,
        )
    }

    fn terminal_states(rx: &Receiver<Notification>) -> Vec<ThreadState> {
        rx.try_iter()
            .filter_map(|msg| match msg {
                Notification::ThreadContext(s) if s.state.is_terminal() => Some(s.state),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_entry_points_follow_registrations() {
        let (executor, debugger, _rx) = executor();
        executor.register_handler(PROGRAM_START, "main", |_| Ok(()));
        executor.register_handler("KEY_PRESSED", "onKey", |_| Ok(()));

        let mut ids = crate::debugger::Debugger::entry_point_ids(debugger.as_ref());
        ids.sort();
        assert_eq!(ids, vec![SymbolId::new("main"), SymbolId::new("onKey")]);
    }

    #[test]
    fn test_panicking_handler_ends_with_error_once() {
        let (executor, debugger, rx) = executor();
        executor.register_handler(PROGRAM_START, "main", |_| panic!("boom"));

        for worker in executor.start().unwrap() {
            worker.join().unwrap();
        }
        assert_eq!(terminal_states(&rx), vec![ThreadState::Error]);
        assert!(debugger.threads().is_empty());
    }

    #[test]
    fn test_program_exception_keeps_call_stack() {
        let (executor, _debugger, rx) = executor();
        executor.register_handler(PROGRAM_START, "main", |w| {
            w.call("divide", |w| Err(w.exception("division by zero")))
        });

        for worker in executor.start().unwrap() {
            worker.join().unwrap();
        }
        let snapshot = rx
            .try_iter()
            .find_map(|msg| match msg {
                Notification::ThreadContext(s) => Some(s),
                _ => None,
            })
            .unwrap();
        let exception = snapshot.exception.unwrap();
        assert_eq!(exception.message, "division by zero");
        assert_eq!(exception.call_stack.len(), 2);
        assert_eq!(exception.call_stack[1].symbol_id, SymbolId::new("divide"));
    }

    #[test]
    fn test_unknown_event_starts_nothing() {
        let (executor, _debugger, rx) = executor();
        let workers = executor.fire_event(&ProgramEvent::new("NOTHING")).unwrap();
        assert!(workers.is_empty());
        assert!(rx.try_recv().is_err());
    }
}
