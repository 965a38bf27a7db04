//! Thread control and introspection for running block programs
//!
//! Two interfaces meet in [`ProgramDebugger`]: [`Debugger`] is driven by the
//! controller, [`DebugInstrumentation`] is called by executing program code
//! on its worker threads. Pausing is cooperative and only happens inside
//! [`DebugInstrumentation::conditional_wait`].

pub mod breakpoints;
pub mod context;
pub mod core;
pub mod introspect;
pub mod registry;
pub mod value;

pub use self::core::ProgramDebugger;
pub use breakpoints::BreakpointSet;
pub use context::ThreadContext;
pub use registry::{current_thread_id, ThreadInfo, ThreadRegistry};
pub use value::{ListHandle, ListVar, ScalarVar, StringGenerator, Value, VarAccessor};

use std::sync::Arc;

use crate::common::Result;
use crate::message::{ListVariable, Notification, SymbolId, Variable};

/// Destination of notifications emitted by the debugger
pub trait NotificationSink: Send + Sync {
    /// Queue `msg`, returning false if it could not be delivered
    fn send(&self, msg: Notification) -> bool;
}

impl NotificationSink for crossbeam_channel::Sender<Notification> {
    fn send(&self, msg: Notification) -> bool {
        crossbeam_channel::Sender::send(self, msg).is_ok()
    }
}

/// Control API used by the controller side
pub trait Debugger: Send + Sync {
    /// Pause `thread_id` at its next pause point
    fn suspend(&self, thread_id: u64) -> Result<()>;
    fn suspend_all(&self);

    fn resume(&self, thread_id: u64) -> Result<()>;
    fn resume_all(&self);

    fn step_over(&self, thread_id: u64) -> Result<()>;
    fn step_into(&self, thread_id: u64) -> Result<()>;
    fn step_out(&self, thread_id: u64) -> Result<()>;

    fn add_breakpoints(&self, ids: Vec<SymbolId>);
    fn remove_breakpoints(&self, ids: Vec<SymbolId>);
    fn set_breakpoints(&self, ids: Vec<SymbolId>);

    fn get_local_variables(&self, thread_id: u64, frame_idx: i64) -> Result<Vec<Variable>>;
    fn get_local_list_values(
        &self,
        thread_id: u64,
        frame_idx: i64,
        var_id: &SymbolId,
        start_idx: i64,
        length: i64,
    ) -> Result<ListVariable>;
    fn get_global_variables(&self) -> Vec<Variable>;
    fn get_global_list_values(
        &self,
        var_id: &SymbolId,
        start_idx: i64,
        length: i64,
    ) -> Result<ListVariable>;

    /// Emit one notification per tracked thread
    fn send_thread_contexts(&self);

    fn entry_point_ids(&self) -> Vec<SymbolId>;
}

/// Hooks called by executing program code
pub trait DebugInstrumentation: Send + Sync {
    /// Register the calling thread. Returns its thread id.
    fn notify_thread_start(&self, context: Arc<ThreadContext>) -> u64;

    /// Unregister the calling thread after a normal end
    fn notify_thread_end(&self);

    /// Unregister the calling thread after it failed with `error`
    fn notify_thread_end_with_error(&self, error: &(dyn std::error::Error + 'static));

    /// Context of the calling thread, if it is registered
    fn thread_context(&self) -> Option<Arc<ThreadContext>>;

    /// Pause point. Blocks while the calling thread is suspended.
    fn conditional_wait(&self, step_id: &SymbolId);

    fn set_string_generator(&self, generator: StringGenerator);
    fn set_global_variables(&self, vars: Vec<Arc<dyn VarAccessor>>);
    fn set_entry_point_ids(&self, ids: Vec<SymbolId>);
}
