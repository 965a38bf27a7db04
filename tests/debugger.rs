//! End-to-end debugger tests with real worker threads
//!
//! Each test runs a small program on the executor and drives it through the
//! control API while watching the notifications the debugger emits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use block_runtime::agent::{IoAgent, SimulatorAgent};
use block_runtime::debugger::{DebugInstrumentation, Debugger, ListVar, ProgramDebugger, ScalarVar, Value};
use block_runtime::message::{
    Notification, SymbolId, ThreadSnapshot, ThreadState, Variable, PROGRAM_START,
};
use block_runtime::runtime::ProgramExecutor;
use block_runtime::Error;
use crossbeam_channel::{unbounded, Receiver};

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    debugger: Arc<ProgramDebugger>,
    executor: ProgramExecutor,
    rx: Receiver<Notification>,
}

impl Harness {
    fn new() -> Self {
        let (tx, rx) = unbounded::<Notification>();
        let sink = Arc::new(tx);
        let debugger = Arc::new(ProgramDebugger::new(sink.clone()));
        let io = Arc::new(IoAgent::new(sink.clone(), 8, false));
        let simulator = Arc::new(SimulatorAgent::new(sink));
        let executor = ProgramExecutor::new(debugger.clone(), io, simulator);
        Self {
            debugger,
            executor,
            rx,
        }
    }

    fn start(&self) -> Vec<JoinHandle<()>> {
        self.executor.start().expect("failed to start program")
    }

    /// Next thread snapshot, skipping other notifications
    fn next_snapshot(&self) -> ThreadSnapshot {
        loop {
            match self.rx.recv_timeout(WAIT) {
                Ok(Notification::ThreadContext(snapshot)) => return snapshot,
                Ok(_) => continue,
                Err(e) => panic!("No thread snapshot within {:?}: {}", WAIT, e),
            }
        }
    }

    fn expect_suspended_at(&self, step: &str) -> ThreadSnapshot {
        let snapshot = self.next_snapshot();
        assert_eq!(snapshot.state, ThreadState::Suspended, "{snapshot:?}");
        assert_eq!(snapshot.next_step, Some(SymbolId::new(step)));
        snapshot
    }

    fn expect_state(&self, state: ThreadState) -> ThreadSnapshot {
        let snapshot = self.next_snapshot();
        assert_eq!(snapshot.state, state, "{snapshot:?}");
        snapshot
    }

    /// Wait until exactly `count` threads are registered
    fn wait_for_threads(&self, count: usize) -> Vec<u64> {
        let deadline = std::time::Instant::now() + WAIT;
        loop {
            let ids: Vec<u64> = self
                .debugger
                .threads()
                .all()
                .iter()
                .map(|info| info.thread_id())
                .collect();
            if ids.len() == count {
                return ids;
            }
            assert!(std::time::Instant::now() < deadline, "threads never started");
            std::thread::yield_now();
        }
    }
}

fn join(workers: Vec<JoinHandle<()>>) {
    for worker in workers {
        worker.join().expect("worker thread panicked");
    }
}

/// main: s1, call f { f1, f2 }, s2
fn register_nested_program(harness: &Harness) {
    harness.executor.register_handler(PROGRAM_START, "main", |w| {
        w.step("s1");
        w.call("f", |w| {
            w.step("f1");
            w.step("f2");
            Ok(())
        })?;
        w.step("s2");
        Ok(())
    });
}

#[test]
fn test_breakpoint_pause_and_resume() {
    let harness = Harness::new();
    harness.debugger.set_breakpoints(vec!["B".into()]);
    harness.executor.register_handler(PROGRAM_START, "main", |w| {
        w.step("A");
        w.step("B");
        w.step("C");
        Ok(())
    });

    let workers = harness.start();
    let suspended = harness.expect_suspended_at("B");
    assert_eq!(suspended.call_stack.len(), 1);

    harness.debugger.resume(suspended.thread_id).unwrap();
    let running = harness.expect_state(ThreadState::Running);
    assert_eq!(running.thread_id, suspended.thread_id);
    let finished = harness.expect_state(ThreadState::Finished);
    assert!(finished.exception.is_none());

    join(workers);
    assert!(harness.debugger.threads().is_empty());
}

#[test]
fn test_step_over_skips_nested_call() {
    let harness = Harness::new();
    harness.debugger.set_breakpoints(vec!["s1".into()]);
    register_nested_program(&harness);

    let workers = harness.start();
    let thread_id = harness.expect_suspended_at("s1").thread_id;

    harness.debugger.step_over(thread_id).unwrap();
    harness.expect_state(ThreadState::Running);
    let snapshot = harness.expect_suspended_at("s2");
    assert_eq!(snapshot.call_stack.len(), 1);

    harness.debugger.resume(thread_id).unwrap();
    harness.expect_state(ThreadState::Running);
    harness.expect_state(ThreadState::Finished);
    join(workers);
}

#[test]
fn test_step_into_then_out() {
    let harness = Harness::new();
    harness.debugger.set_breakpoints(vec!["s1".into()]);
    register_nested_program(&harness);

    let workers = harness.start();
    let thread_id = harness.expect_suspended_at("s1").thread_id;

    harness.debugger.step_into(thread_id).unwrap();
    harness.expect_state(ThreadState::Running);
    let inside = harness.expect_suspended_at("f1");
    assert_eq!(
        inside.call_stack.last().map(|item| item.symbol_id.clone()),
        Some(SymbolId::new("f"))
    );

    harness.debugger.step_out(thread_id).unwrap();
    harness.expect_state(ThreadState::Running);
    harness.expect_suspended_at("s2");

    harness.debugger.resume(thread_id).unwrap();
    harness.expect_state(ThreadState::Running);
    harness.expect_state(ThreadState::Finished);
    join(workers);
}

#[test]
fn test_step_out_at_top_level_stops_at_next_step() {
    let harness = Harness::new();
    harness.debugger.set_breakpoints(vec!["s1".into()]);
    register_nested_program(&harness);

    let workers = harness.start();
    let thread_id = harness.expect_suspended_at("s1").thread_id;

    // The threshold never drops below the outermost call
    harness.debugger.step_out(thread_id).unwrap();
    harness.expect_state(ThreadState::Running);
    harness.expect_suspended_at("s2");

    harness.debugger.resume(thread_id).unwrap();
    join(workers);
}

#[test]
fn test_suspend_running_thread_and_inspect() {
    let harness = Harness::new();
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        harness.executor.register_handler(PROGRAM_START, "main", move |w| {
            w.declare(ScalarVar::new("count", Value::Number(3.0)));
            w.declare(ListVar::new(
                "items",
                (0..10).map(|i| Value::Number(i as f64)).collect(),
            ));
            while !stop.load(Ordering::SeqCst) {
                w.step("tick");
            }
            Ok(())
        });
    }

    let workers = harness.start();
    let thread_id = harness.wait_for_threads(1)[0];
    harness.debugger.suspend(thread_id).unwrap();
    harness.expect_suspended_at("tick");

    let variables = harness.debugger.get_local_variables(thread_id, 0).unwrap();
    assert_eq!(variables.len(), 2);
    match &variables[0] {
        Variable::Scalar(v) => assert_eq!(v.value, "3"),
        other => panic!("Expected scalar, got {other:?}"),
    }
    match &variables[1] {
        Variable::List(v) => {
            assert_eq!(v.length, 10);
            assert!(v.slices.is_empty());
        }
        other => panic!("Expected list, got {other:?}"),
    }

    let list = harness
        .debugger
        .get_local_list_values(thread_id, 0, &"items".into(), -2, -3)
        .unwrap();
    assert_eq!(list.slices.len(), 1);
    assert_eq!(list.slices[0].start_idx, 6);
    assert_eq!(list.slices[0].values, vec!["6", "7", "8"]);

    assert!(matches!(
        harness.debugger.get_local_variables(thread_id, 5),
        Err(Error::IndexOutOfBounds { index: 5, .. })
    ));
    assert!(matches!(
        harness.debugger.get_local_variables(thread_id, -1),
        Err(Error::IndexOutOfBounds { index: -1, .. })
    ));
    assert!(matches!(
        harness
            .debugger
            .get_local_list_values(thread_id, 0, &"count".into(), 0, 1),
        Err(Error::NoSuchSymbol(_))
    ));

    stop.store(true, Ordering::SeqCst);
    harness.debugger.resume(thread_id).unwrap();
    harness.expect_state(ThreadState::Running);
    harness.expect_state(ThreadState::Finished);
    join(workers);
}

#[test]
fn test_introspection_requires_suspended_thread() {
    let harness = Harness::new();
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        harness.executor.register_handler(PROGRAM_START, "main", move |w| {
            while !stop.load(Ordering::SeqCst) {
                w.step("spin");
            }
            Ok(())
        });
    }

    let workers = harness.start();
    let thread_id = harness.wait_for_threads(1)[0];

    assert!(matches!(
        harness.debugger.get_local_variables(thread_id, 0),
        Err(Error::ThreadNotSuspended(id)) if id == thread_id
    ));
    assert!(matches!(
        harness.debugger.step_over(thread_id),
        Err(Error::ThreadNotSuspended(_))
    ));

    stop.store(true, Ordering::SeqCst);
    join(workers);
    assert!(matches!(
        harness.debugger.resume(thread_id),
        Err(Error::NoSuchThread(_))
    ));
}

#[test]
fn test_suspend_all_then_thread_contexts() {
    let harness = Harness::new();
    let stop = Arc::new(AtomicBool::new(false));
    for entry in ["first", "second"] {
        let stop = stop.clone();
        harness.executor.register_handler(PROGRAM_START, entry, move |w| {
            w.declare(ScalarVar::new("name", Value::from(entry)));
            while !stop.load(Ordering::SeqCst) {
                w.step(format!("{entry}-loop"));
            }
            Ok(())
        });
    }

    let workers = harness.start();
    harness.wait_for_threads(2);
    harness.debugger.suspend_all();
    harness.expect_state(ThreadState::Suspended);
    harness.expect_state(ThreadState::Suspended);

    harness.debugger.send_thread_contexts();
    let contexts = [harness.next_snapshot(), harness.next_snapshot()];
    for snapshot in &contexts {
        assert_eq!(snapshot.state, ThreadState::Suspended);
        assert_eq!(snapshot.variables.len(), 1);
        assert_eq!(snapshot.variables[0].variables.len(), 1);
    }

    stop.store(true, Ordering::SeqCst);
    harness.debugger.resume_all();
    let ends: Vec<ThreadState> = (0..4).map(|_| harness.next_snapshot().state).collect();
    assert_eq!(
        ends.iter().filter(|s| **s == ThreadState::Running).count(),
        2
    );
    assert_eq!(
        ends.iter().filter(|s| **s == ThreadState::Finished).count(),
        2
    );
    join(workers);
}

#[test]
fn test_failed_thread_reports_error_messages() {
    let harness = Harness::new();
    harness.executor.register_handler(PROGRAM_START, "main", |w| {
        w.error_message("list index out of range");
        w.call("lookup", |_| Err(Error::Internal("index 4 of 2".into())))
    });

    let workers = harness.start();
    let snapshot = harness.expect_state(ThreadState::Error);
    let exception = snapshot.exception.expect("missing exception");
    assert_eq!(exception.message, "list index out of range");
    assert_eq!(exception.cause.as_deref(), Some("Internal error: index 4 of 2"));
    assert_eq!(exception.call_stack.len(), 2);
    join(workers);
}

#[test]
fn test_thread_context_hook_sees_own_context() {
    let harness = Harness::new();
    let debugger = harness.debugger.clone();
    harness.executor.register_handler(PROGRAM_START, "main", move |w| {
        let context = debugger.thread_context().expect("thread not registered");
        assert!(Arc::ptr_eq(&context, w.context()));
        Ok(())
    });

    let workers = harness.start();
    harness.expect_state(ThreadState::Finished);
    join(workers);
    assert!(harness.debugger.thread_context().is_none());
}
