//! Debugger core: control API, instrumentation hooks and pausing

use parking_lot::RwLock;
use std::sync::Arc;

use super::breakpoints::BreakpointSet;
use super::context::ThreadContext;
use super::introspect;
use super::registry::{current_thread_id, ThreadInfo, ThreadRegistry, ALWAYS_STOP, NO_THRESHOLD};
use super::value::{StringGenerator, Value, VarAccessor};
use super::{DebugInstrumentation, Debugger, NotificationSink};
use crate::common::{Error, Result};
use crate::message::{
    ListVariable, Notification, ProgramException, SymbolId, ThreadSnapshot, ThreadState,
    VarStackFrame, Variable,
};
use crate::sync::MemorySync;

/// Debugger shared by the controller-facing threads and all worker threads
pub struct ProgramDebugger {
    threads: ThreadRegistry,
    breakpoints: BreakpointSet,
    to_str: RwLock<StringGenerator>,
    globals: RwLock<Arc<Vec<Arc<dyn VarAccessor>>>>,
    entry_points: RwLock<Vec<SymbolId>>,
    mem_sync: MemorySync,
    sink: Arc<dyn NotificationSink>,
}

impl ProgramDebugger {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            threads: ThreadRegistry::new(),
            breakpoints: BreakpointSet::new(),
            to_str: RwLock::new(Arc::new(|v: &Value| v.to_string())),
            globals: RwLock::new(Arc::new(Vec::new())),
            entry_points: RwLock::new(Vec::new()),
            mem_sync: MemorySync::new(),
            sink,
        }
    }

    pub fn threads(&self) -> &ThreadRegistry {
        &self.threads
    }

    pub fn breakpoints(&self) -> &BreakpointSet {
        &self.breakpoints
    }

    fn notify(&self, msg: Notification) {
        let id = msg.id();
        if !self.sink.send(msg) {
            tracing::warn!(id, "Dropped notification, controller queue unavailable");
        }
    }

    fn string_generator(&self) -> StringGenerator {
        self.to_str.read().clone()
    }

    fn suspended_thread(&self, thread_id: u64) -> Result<Arc<ThreadInfo>> {
        let info = self.threads.find(thread_id)?;
        if info.state() != ThreadState::Suspended {
            return Err(Error::ThreadNotSuspended(thread_id));
        }
        Ok(info)
    }

    /// Let a suspended thread run until its call-stack depth is at most the
    /// threshold computed from its current depth.
    fn restart(&self, thread_id: u64, threshold: impl FnOnce(i64) -> i64) -> Result<()> {
        let info = self.threads.find(thread_id)?;
        let stop_threshold = {
            let _guard = info.lock();
            if info.state() != ThreadState::Suspended {
                return Err(Error::ThreadNotSuspended(thread_id));
            }
            let stop_threshold = threshold(info.context().call_stack_depth() as i64);
            info.set_stop_threshold(stop_threshold);
            // The worker must not run before it is reported as running
            info.set_state(ThreadState::Running);
            self.mem_sync.sync_write();
            self.notify(Notification::ThreadContext(ThreadSnapshot::state_only(
                thread_id,
                ThreadState::Running,
            )));
            stop_threshold
        };
        info.barrier().countdown();
        tracing::debug!(thread_id, stop_threshold, "Thread restarted");
        Ok(())
    }

    fn should_pause(&self, info: &ThreadInfo, step_id: &SymbolId) -> bool {
        let depth = info.context().call_stack_depth() as i64;
        depth <= info.stop_threshold() || self.breakpoints.contains(step_id)
    }

    fn pause(&self, info: &ThreadInfo) {
        let thread_id = info.thread_id();
        self.mem_sync.sync_write();
        {
            let _guard = info.lock();
            info.set_state(ThreadState::Suspended);
            self.notify(Notification::ThreadContext(self.suspended_snapshot(info, false)));
        }
        tracing::debug!(thread_id, step = %info.context().next_step(), "Thread suspended");

        info.barrier().countdown_and_await();
        // Observe what other threads wrote while this one was paused
        self.mem_sync.sync_read();
    }

    fn suspended_snapshot(&self, info: &ThreadInfo, with_variables: bool) -> ThreadSnapshot {
        let context = info.context();
        let mut snapshot = ThreadSnapshot::with_call_stack(
            info.thread_id(),
            ThreadState::Suspended,
            context.call_stack(),
            context.next_step(),
        );
        if with_variables {
            let to_str = self.string_generator();
            snapshot.variables = context
                .frames()
                .iter()
                .enumerate()
                .map(|(idx, frame)| VarStackFrame {
                    idx,
                    variables: introspect::describe_all(frame, &to_str),
                })
                .collect();
        }
        snapshot
    }

    fn end_thread(&self, exception: impl FnOnce(&ThreadInfo) -> Option<ProgramException>) {
        let thread_id = current_thread_id();
        if let Some(info) = self.threads.remove(thread_id) {
            let _guard = info.lock();
            let exception = exception(&info);
            let snapshot =
                ThreadSnapshot::terminated(thread_id, info.context().call_stack(), exception);
            info.set_state(snapshot.state);
            tracing::info!(thread_id, state = ?snapshot.state, "Thread ended");
            self.notify(Notification::ThreadContext(snapshot));
        }
        self.mem_sync.sync_write();
    }
}

/// Program exception carried by `error` or its direct source
fn find_program_exception<'a>(
    error: &'a (dyn std::error::Error + 'static),
) -> Option<&'a ProgramException> {
    error.downcast_ref::<ProgramException>().or_else(|| {
        error
            .source()
            .and_then(|source| source.downcast_ref::<ProgramException>())
    })
}

fn program_exception(info: &ThreadInfo, error: &(dyn std::error::Error + 'static)) -> ProgramException {
    if let Some(exception) = find_program_exception(error) {
        return exception.clone();
    }
    let message = info.context().error_messages().join("\n");
    ProgramException::new(info.thread_id(), message, info.context().call_stack())
        .with_cause(error.to_string())
}

impl Debugger for ProgramDebugger {
    fn suspend(&self, thread_id: u64) -> Result<()> {
        let info = self.threads.find(thread_id)?;
        info.set_stop_threshold(ALWAYS_STOP);
        tracing::debug!(thread_id, "Suspend requested");
        Ok(())
    }

    fn suspend_all(&self) {
        for info in self.threads.all() {
            info.set_stop_threshold(ALWAYS_STOP);
        }
        tracing::debug!("Suspend requested for all threads");
    }

    fn resume(&self, thread_id: u64) -> Result<()> {
        self.restart(thread_id, |_| NO_THRESHOLD)
    }

    fn resume_all(&self) {
        for info in self.threads.all() {
            if info.state() == ThreadState::Suspended {
                // Another resume may win the race; that is not an error here
                let _ = self.restart(info.thread_id(), |_| NO_THRESHOLD);
            }
        }
    }

    fn step_over(&self, thread_id: u64) -> Result<()> {
        self.restart(thread_id, |depth| depth)
    }

    fn step_into(&self, thread_id: u64) -> Result<()> {
        self.restart(thread_id, |depth| depth + 1)
    }

    fn step_out(&self, thread_id: u64) -> Result<()> {
        self.restart(thread_id, |depth| (depth - 1).max(1))
    }

    fn add_breakpoints(&self, ids: Vec<SymbolId>) {
        tracing::debug!(count = ids.len(), "Adding breakpoints");
        self.breakpoints.add(ids);
    }

    fn remove_breakpoints(&self, ids: Vec<SymbolId>) {
        tracing::debug!(count = ids.len(), "Removing breakpoints");
        self.breakpoints.remove(ids);
    }

    fn set_breakpoints(&self, ids: Vec<SymbolId>) {
        tracing::debug!(count = ids.len(), "Replacing breakpoints");
        self.breakpoints.set(ids);
    }

    fn get_local_variables(&self, thread_id: u64, frame_idx: i64) -> Result<Vec<Variable>> {
        self.mem_sync.sync_read();
        let info = self.suspended_thread(thread_id)?;
        let frame = info.context().frame(frame_idx)?;
        Ok(introspect::describe_all(&frame, &self.string_generator()))
    }

    fn get_local_list_values(
        &self,
        thread_id: u64,
        frame_idx: i64,
        var_id: &SymbolId,
        start_idx: i64,
        length: i64,
    ) -> Result<ListVariable> {
        self.mem_sync.sync_read();
        let info = self.suspended_thread(thread_id)?;
        let frame = info.context().frame(frame_idx)?;
        introspect::list_values(&frame, var_id, start_idx, length, &self.string_generator())
    }

    fn get_global_variables(&self) -> Vec<Variable> {
        self.mem_sync.sync_read();
        let globals = self.globals.read().clone();
        introspect::describe_all(&globals, &self.string_generator())
    }

    fn get_global_list_values(
        &self,
        var_id: &SymbolId,
        start_idx: i64,
        length: i64,
    ) -> Result<ListVariable> {
        self.mem_sync.sync_read();
        let globals = self.globals.read().clone();
        introspect::list_values(&globals, var_id, start_idx, length, &self.string_generator())
    }

    fn send_thread_contexts(&self) {
        self.mem_sync.sync_read();
        for info in self.threads.all() {
            let _guard = info.lock();
            match info.state() {
                ThreadState::Suspended => {
                    self.notify(Notification::ThreadContext(self.suspended_snapshot(&info, true)));
                }
                ThreadState::Running => {
                    self.notify(Notification::ThreadContext(ThreadSnapshot::state_only(
                        info.thread_id(),
                        ThreadState::Running,
                    )));
                }
                ThreadState::Finished | ThreadState::Error => {}
            }
        }
    }

    fn entry_point_ids(&self) -> Vec<SymbolId> {
        self.entry_points.read().clone()
    }
}

impl DebugInstrumentation for ProgramDebugger {
    fn notify_thread_start(&self, context: Arc<ThreadContext>) -> u64 {
        let thread_id = current_thread_id();
        self.threads
            .insert(Arc::new(ThreadInfo::new(thread_id, context)));
        self.mem_sync.sync_write();
        tracing::info!(thread_id, "Thread started");
        thread_id
    }

    fn notify_thread_end(&self) {
        self.end_thread(|_| None);
    }

    fn notify_thread_end_with_error(&self, error: &(dyn std::error::Error + 'static)) {
        tracing::debug!(thread_id = current_thread_id(), %error, "Thread failed");
        self.end_thread(|info| Some(program_exception(info, error)));
    }

    fn thread_context(&self) -> Option<Arc<ThreadContext>> {
        self.threads
            .get(current_thread_id())
            .map(|info| info.context().clone())
    }

    fn conditional_wait(&self, step_id: &SymbolId) {
        if step_id.is_none() {
            return;
        }
        let Some(info) = self.threads.get(current_thread_id()) else {
            return;
        };
        info.context().set_next_step(step_id.clone());
        if self.should_pause(&info, step_id) {
            self.pause(&info);
        }
    }

    fn set_string_generator(&self, generator: StringGenerator) {
        *self.to_str.write() = generator;
    }

    fn set_global_variables(&self, vars: Vec<Arc<dyn VarAccessor>>) {
        *self.globals.write() = Arc::new(vars);
        self.mem_sync.sync_write();
    }

    fn set_entry_point_ids(&self, ids: Vec<SymbolId>) {
        *self.entry_points.write() = ids;
    }
}
