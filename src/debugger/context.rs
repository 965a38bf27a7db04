//! Per-thread execution context
//!
//! Mutated by its worker thread while running. Other threads read it only
//! while the worker is suspended or after it ended.

use parking_lot::RwLock;
use std::sync::Arc;

use super::value::VarAccessor;
use crate::common::{Error, Result};
use crate::message::{CallStackItem, SymbolId};

/// Variables declared in one frame
pub type Frame = Vec<Arc<dyn VarAccessor>>;

#[derive(Default)]
struct ContextData {
    call_stack: Vec<CallStackItem>,
    var_stack: Vec<Frame>,
    next_step: SymbolId,
    errors: Vec<String>,
}

#[derive(Default)]
pub struct ThreadContext {
    data: RwLock<ContextData>,
}

impl std::fmt::Debug for ThreadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data.read();
        f.debug_struct("ThreadContext")
            .field("call_stack", &data.call_stack)
            .field("var_stack_depth", &data.var_stack.len())
            .field("next_step", &data.next_step)
            .finish()
    }
}

impl ThreadContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Enter a function: push a call-stack entry and an empty variable frame
    pub fn push_call(&self, symbol_id: SymbolId) {
        let mut data = self.data.write();
        let frame_idx = data.var_stack.len();
        data.call_stack.push(CallStackItem::new(frame_idx, symbol_id));
        data.var_stack.push(Vec::new());
    }

    /// Leave the innermost function
    pub fn pop_call(&self) {
        let mut data = self.data.write();
        data.call_stack.pop();
        data.var_stack.pop();
    }

    /// Push a variable frame without a call (a nested block scope)
    pub fn push_frame(&self) {
        self.data.write().var_stack.push(Vec::new());
    }

    pub fn pop_frame(&self) {
        self.data.write().var_stack.pop();
    }

    /// Declare a variable in the innermost frame
    pub fn declare(&self, var: Arc<dyn VarAccessor>) {
        let mut data = self.data.write();
        if data.var_stack.is_empty() {
            data.var_stack.push(Vec::new());
        }
        if let Some(frame) = data.var_stack.last_mut() {
            frame.push(var);
        }
    }

    pub fn set_next_step(&self, step: SymbolId) {
        self.data.write().next_step = step;
    }

    pub fn next_step(&self) -> SymbolId {
        self.data.read().next_step.clone()
    }

    /// Record an error message reported by the executing code
    pub fn add_error_message(&self, message: impl Into<String>) {
        self.data.write().errors.push(message.into());
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.data.read().errors.clone()
    }

    pub fn call_stack(&self) -> Vec<CallStackItem> {
        self.data.read().call_stack.clone()
    }

    pub fn call_stack_depth(&self) -> usize {
        self.data.read().call_stack.len()
    }

    pub fn var_stack_depth(&self) -> usize {
        self.data.read().var_stack.len()
    }

    /// Variables of frame `idx`, counted from the outermost frame
    pub fn frame(&self, idx: i64) -> Result<Frame> {
        let data = self.data.read();
        usize::try_from(idx)
            .ok()
            .and_then(|i| data.var_stack.get(i))
            .cloned()
            .ok_or_else(|| Error::index_out_of_bounds(idx, data.var_stack.len()))
    }

    /// Every frame of the variable stack, outermost first
    pub fn frames(&self) -> Vec<Frame> {
        self.data.read().var_stack.clone()
    }
}
