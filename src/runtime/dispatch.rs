//! Debug command dispatcher
//!
//! Translates debug requests into debugger calls. Every request gets exactly
//! one response with the request's id; errors become failed responses.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::common::{Error, Result};
use crate::debugger::Debugger;
use crate::message::{DebugCmd, DebugRequest, DebugResponse, DebugResult, ThreadTarget};

pub struct DebugCmdProcessor {
    debugger: Arc<dyn Debugger>,
}

impl DebugCmdProcessor {
    pub fn new(debugger: Arc<dyn Debugger>) -> Self {
        Self { debugger }
    }

    /// Handle a debug request
    pub fn handle(&self, request: DebugRequest) -> DebugResponse {
        let kind = request.command.kind();
        tracing::debug!(id = request.id, ?kind, "Processing debug command");

        let outcome = catch_unwind(AssertUnwindSafe(|| self.handle_inner(request.command)))
            .unwrap_or_else(|_| Err(Error::Internal(format!("{:?} panicked", kind))));

        match outcome {
            Ok(result) => DebugResponse::success(request.id, kind, result),
            Err(e) => {
                tracing::debug!(id = request.id, ?kind, error = %e, "Debug command failed");
                DebugResponse::failure(request.id, kind, &e)
            }
        }
    }

    fn handle_inner(&self, command: DebugCmd) -> Result<Option<DebugResult>> {
        let debugger = &self.debugger;
        match command {
            // === Breakpoints ===
            DebugCmd::AddBreakpoints { breakpoints } => {
                debugger.add_breakpoints(breakpoints);
                Ok(None)
            }
            DebugCmd::RemoveBreakpoints { breakpoints } => {
                debugger.remove_breakpoints(breakpoints);
                Ok(None)
            }
            DebugCmd::SetBreakpoints { breakpoints } => {
                debugger.set_breakpoints(breakpoints);
                Ok(None)
            }

            // === Execution Control ===
            DebugCmd::SuspendThread { thread } => {
                match thread {
                    ThreadTarget::All => debugger.suspend_all(),
                    ThreadTarget::Id(id) => debugger.suspend(id)?,
                }
                Ok(None)
            }
            DebugCmd::ResumeThread { thread } => {
                match thread {
                    ThreadTarget::All => debugger.resume_all(),
                    ThreadTarget::Id(id) => debugger.resume(id)?,
                }
                Ok(None)
            }
            DebugCmd::StepOver { thread_id } => {
                debugger.step_over(thread_id)?;
                Ok(None)
            }
            DebugCmd::StepInto { thread_id } => {
                debugger.step_into(thread_id)?;
                Ok(None)
            }
            DebugCmd::StepOut { thread_id } => {
                debugger.step_out(thread_id)?;
                Ok(None)
            }

            // === State Inspection ===
            DebugCmd::GetLocalVars {
                thread_id,
                frame_idx,
            } => {
                let variables = debugger.get_local_variables(thread_id, frame_idx)?;
                Ok(Some(DebugResult::Variables { variables }))
            }
            DebugCmd::GetLocalListVals {
                thread_id,
                frame_idx,
                var_id,
                start_idx,
                length,
            } => {
                let variable =
                    debugger.get_local_list_values(thread_id, frame_idx, &var_id, start_idx, length)?;
                Ok(Some(DebugResult::ListValues { variable }))
            }
            DebugCmd::GetGlobalVars => {
                let variables = debugger.get_global_variables();
                Ok(Some(DebugResult::Variables { variables }))
            }
            DebugCmd::GetGlobalListVals {
                var_id,
                start_idx,
                length,
            } => {
                let variable = debugger.get_global_list_values(&var_id, start_idx, length)?;
                Ok(Some(DebugResult::ListValues { variable }))
            }
            DebugCmd::GetThreadContexts => {
                debugger.send_thread_contexts();
                Ok(None)
            }
            DebugCmd::GetEntryPoints => Ok(Some(DebugResult::EntryPoints {
                ids: debugger.entry_point_ids(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debugger::{DebugInstrumentation, ProgramDebugger, ScalarVar, Value};
    use crate::message::{DebugKind, Notification, SymbolId};
    use crossbeam_channel::unbounded;

    fn processor() -> (DebugCmdProcessor, Arc<ProgramDebugger>) {
        let (tx, _rx) = unbounded::<Notification>();
        let debugger = Arc::new(ProgramDebugger::new(Arc::new(tx)));
        (DebugCmdProcessor::new(debugger.clone()), debugger)
    }

    #[test]
    fn test_failure_keeps_request_id() {
        let (processor, _) = processor();
        let request = DebugRequest::new(DebugCmd::StepInto { thread_id: 12_345 });
        let id = request.id;

        let resp = processor.handle(request);
        assert_eq!(resp.id, id);
        assert_eq!(resp.kind, DebugKind::StepInto);
        assert!(!resp.success);
        assert_eq!(resp.exception.unwrap().code, "NO_SUCH_THREAD");
    }

    #[test]
    fn test_breakpoint_commands_update_set() {
        let (processor, debugger) = processor();
        let ids = |names: &[&str]| names.iter().map(|n| SymbolId::new(*n)).collect::<Vec<_>>();

        processor.handle(DebugRequest::new(DebugCmd::SetBreakpoints {
            breakpoints: ids(&["A", "B"]),
        }));
        processor.handle(DebugRequest::new(DebugCmd::SetBreakpoints {
            breakpoints: ids(&["B", "C"]),
        }));
        let resp = processor.handle(DebugRequest::new(DebugCmd::RemoveBreakpoints {
            breakpoints: ids(&["C"]),
        }));

        assert!(resp.success);
        assert!(resp.result.is_none());
        assert_eq!(debugger.breakpoints().snapshot(), ids(&["B"]));
    }

    #[test]
    fn test_global_vars_and_entry_points() {
        let (processor, debugger) = processor();
        debugger.set_global_variables(vec![ScalarVar::new("x", Value::Number(4.0))]);
        debugger.set_entry_point_ids(vec!["onStart".into()]);

        let resp = processor.handle(DebugRequest::new(DebugCmd::GetGlobalVars));
        match resp.result {
            Some(DebugResult::Variables { variables }) => assert_eq!(variables.len(), 1),
            other => panic!("Expected variables, got {other:?}"),
        }

        let resp = processor.handle(DebugRequest::new(DebugCmd::GetEntryPoints));
        assert_eq!(
            resp.result,
            Some(DebugResult::EntryPoints {
                ids: vec!["onStart".into()]
            })
        );
    }

    #[test]
    fn test_missing_list_is_no_such_symbol() {
        let (processor, _) = processor();
        let resp = processor.handle(DebugRequest::new(DebugCmd::GetGlobalListVals {
            var_id: "nope".into(),
            start_idx: 0,
            length: 3,
        }));
        assert_eq!(resp.kind, DebugKind::GetGlobalListVals);
        assert_eq!(resp.exception.unwrap().code, "NO_SUCH_SYMBOL");
    }
}
