//! CLI command handling
//!
//! Sends controller commands to the running runtime and formats output.

use std::time::Duration;

use crate::commands::{BreakpointCommands, Commands, ThreadArg};
use crate::common::{config::Config, logging, paths, Error, Result};
use crate::message::{
    DebugCmd, DebugResult, ListVariable, Notification, Response, SimulatorResp, SymbolId,
    TextIoCmd, TextIoResp, ThreadSnapshot, ThreadTarget, Variable,
};
use crate::runtime::ControllerClient;

/// How long to wait for a response from the runtime
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Quiet period that ends a burst of thread snapshots
const SNAPSHOT_QUIET: Duration = Duration::from_millis(300);

/// Dispatch a controller command
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Serve { .. } => {
            // Handled in main
            Err(Error::Internal("serve is not a controller command".to_string()))
        }

        Commands::Config => {
            let config = Config::load()?;
            match paths::config_path() {
                Some(path) if path.exists() => println!("# {}", path.display()),
                Some(path) => println!("# {} (not found, using defaults)", path.display()),
                None => println!("# no config directory, using defaults"),
            }
            println!("# socket: {}", paths::socket_name());
            if let Some(log) = logging::runtime_log_path() {
                println!("# log: {}", log.display());
            }
            print!("{}", config.to_toml_string()?);
            Ok(())
        }

        Commands::Threads => {
            let mut client = ControllerClient::connect().await?;
            client.debug(DebugCmd::GetThreadContexts, RESPONSE_TIMEOUT).await?;

            let snapshots: Vec<ThreadSnapshot> = client
                .drain_notifications(SNAPSHOT_QUIET)
                .await?
                .into_iter()
                .filter_map(|msg| match msg {
                    Notification::ThreadContext(s) if !s.state.is_terminal() => Some(s),
                    _ => None,
                })
                .collect();

            if snapshots.is_empty() {
                println!("No threads");
            } else {
                for snapshot in &snapshots {
                    print_snapshot(snapshot);
                }
            }
            Ok(())
        }

        Commands::Breakpoint(bp_cmd) => {
            let mut client = ControllerClient::connect().await?;
            let (command, message) = match bp_cmd {
                BreakpointCommands::Add { ids } => {
                    let message = format!("Added {} breakpoint(s)", ids.len());
                    (DebugCmd::AddBreakpoints { breakpoints: symbols(ids) }, message)
                }
                BreakpointCommands::Remove { ids } => {
                    let message = format!("Removed {} breakpoint(s)", ids.len());
                    (DebugCmd::RemoveBreakpoints { breakpoints: symbols(ids) }, message)
                }
                BreakpointCommands::Set { ids } => {
                    let message = if ids.is_empty() {
                        "Cleared all breakpoints".to_string()
                    } else {
                        format!("Breakpoints set to {}", ids.join(", "))
                    };
                    (DebugCmd::SetBreakpoints { breakpoints: symbols(ids) }, message)
                }
            };
            client.debug(command, RESPONSE_TIMEOUT).await?;
            println!("{}", message);
            Ok(())
        }

        Commands::Suspend(target) => {
            let mut client = ControllerClient::connect().await?;
            let thread = thread_target(&target);
            client
                .debug(DebugCmd::SuspendThread { thread }, RESPONSE_TIMEOUT)
                .await?;
            match thread {
                ThreadTarget::All => println!("Suspending all threads"),
                ThreadTarget::Id(id) => println!("Suspending thread {}", id),
            }
            Ok(())
        }

        Commands::Resume(target) => {
            let mut client = ControllerClient::connect().await?;
            let thread = thread_target(&target);
            client
                .debug(DebugCmd::ResumeThread { thread }, RESPONSE_TIMEOUT)
                .await?;
            match thread {
                ThreadTarget::All => println!("Resumed all threads"),
                ThreadTarget::Id(id) => println!("Resumed thread {}", id),
            }
            Ok(())
        }

        Commands::Next { thread_id } => {
            step(DebugCmd::StepOver { thread_id }, "Stepping over", thread_id).await
        }

        Commands::Step { thread_id } => {
            step(DebugCmd::StepInto { thread_id }, "Stepping into", thread_id).await
        }

        Commands::Finish { thread_id } => {
            step(DebugCmd::StepOut { thread_id }, "Stepping out", thread_id).await
        }

        Commands::Locals { thread_id, frame } => {
            let mut client = ControllerClient::connect().await?;
            let result = client
                .debug(
                    DebugCmd::GetLocalVars {
                        thread_id,
                        frame_idx: frame,
                    },
                    RESPONSE_TIMEOUT,
                )
                .await?;
            print_variables(variables(result)?);
            Ok(())
        }

        Commands::Globals => {
            let mut client = ControllerClient::connect().await?;
            let result = client.debug(DebugCmd::GetGlobalVars, RESPONSE_TIMEOUT).await?;
            print_variables(variables(result)?);
            Ok(())
        }

        Commands::List {
            var_id,
            thread,
            frame,
            start,
            length,
        } => {
            let mut client = ControllerClient::connect().await?;
            let var_id = SymbolId::new(var_id);
            let command = match thread {
                Some(thread_id) => DebugCmd::GetLocalListVals {
                    thread_id,
                    frame_idx: frame,
                    var_id,
                    start_idx: start,
                    length,
                },
                None => DebugCmd::GetGlobalListVals {
                    var_id,
                    start_idx: start,
                    length,
                },
            };
            match client.debug(command, RESPONSE_TIMEOUT).await? {
                Some(DebugResult::ListValues { variable }) => print_list(&variable),
                other => return Err(unexpected_result(other)),
            }
            Ok(())
        }

        Commands::EntryPoints => {
            let mut client = ControllerClient::connect().await?;
            match client.debug(DebugCmd::GetEntryPoints, RESPONSE_TIMEOUT).await? {
                Some(DebugResult::EntryPoints { ids }) if ids.is_empty() => {
                    println!("No entry points")
                }
                Some(DebugResult::EntryPoints { ids }) => {
                    println!("Entry points:");
                    for id in ids {
                        println!("  {}", id);
                    }
                }
                other => return Err(unexpected_result(other)),
            }
            Ok(())
        }

        Commands::Input { text } => {
            let mut client = ControllerClient::connect().await?;
            if client.send_input(&text, RESPONSE_TIMEOUT).await? {
                println!("Sent input");
                Ok(())
            } else {
                Err(Error::agency_failed("text input (buffer full)"))
            }
        }

        Commands::Fire { event } => {
            let mut client = ControllerClient::connect().await?;
            client.fire_event(&event).await?;
            println!("Fired {}", event);
            Ok(())
        }

        Commands::Console => {
            let mut client = ControllerClient::connect().await?;
            eprintln!("Attached to runtime. Press Ctrl+C to detach.");
            tokio::select! {
                result = run_console(&mut client) => result,
                _ = tokio::signal::ctrl_c() => {
                    eprintln!("Detached");
                    Ok(())
                }
            }
        }

        Commands::Logs { lines, clear } => {
            let path = logging::runtime_log_path()
                .ok_or_else(|| Error::Config("no data directory for logs".to_string()))?;

            if clear {
                if path.exists() {
                    std::fs::write(&path, "")?;
                }
                println!("Cleared {}", path.display());
                return Ok(());
            }

            if !path.exists() {
                println!("No log file at {}", path.display());
                return Ok(());
            }
            let content = std::fs::read_to_string(&path).map_err(|e| Error::FileRead {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;
            let all: Vec<&str> = content.lines().collect();
            for line in &all[all.len().saturating_sub(lines)..] {
                println!("{}", line);
            }
            Ok(())
        }
    }
}

async fn step(command: DebugCmd, verb: &str, thread_id: u64) -> Result<()> {
    let mut client = ControllerClient::connect().await?;
    client.debug(command, RESPONSE_TIMEOUT).await?;
    println!("{} in thread {}", verb, thread_id);
    Ok(())
}

/// Print program output and thread events, acknowledging output as shown
async fn run_console(client: &mut ControllerClient) -> Result<()> {
    loop {
        let Some(msg) = client.next_notification(Duration::from_secs(1)).await? else {
            continue;
        };
        match msg {
            Notification::TextIo(TextIoCmd::OutputText { id, text }) => {
                print!("{}", text);
                client
                    .respond(Response::TextIo(TextIoResp::OutputText {
                        id,
                        success: true,
                        text,
                    }))
                    .await?;
            }
            Notification::ThreadContext(snapshot) => print_snapshot(&snapshot),
            Notification::Simulator(cmd) => {
                eprintln!("[simulator] {}", cmd.components.join(" "));
                // No simulator is attached to the console
                client
                    .respond(Response::Simulator(SimulatorResp {
                        id: cmd.id,
                        success: false,
                        components: Vec::new(),
                    }))
                    .await?;
            }
            other => tracing::debug!(id = other.id(), "Ignoring notification"),
        }
    }
}

fn symbols(ids: Vec<String>) -> Vec<SymbolId> {
    ids.into_iter().map(SymbolId::new).collect()
}

fn thread_target(target: &ThreadArg) -> ThreadTarget {
    match target.thread_id {
        Some(id) if !target.all => ThreadTarget::Id(id),
        _ => ThreadTarget::All,
    }
}

fn variables(result: Option<DebugResult>) -> Result<Vec<Variable>> {
    match result {
        Some(DebugResult::Variables { variables }) => Ok(variables),
        other => Err(unexpected_result(other)),
    }
}

fn unexpected_result(result: Option<DebugResult>) -> Error {
    Error::RuntimeCommunication(format!("unexpected result: {:?}", result))
}

fn print_snapshot(snapshot: &ThreadSnapshot) {
    print!("Thread {} [{:?}]", snapshot.thread_id, snapshot.state);
    match &snapshot.next_step {
        Some(step) => println!(" at {}", step),
        None => println!(),
    }
    for item in snapshot.call_stack.iter().rev() {
        println!("  #{} {}", item.frame_idx, item.symbol_id);
    }
    if let Some(exception) = &snapshot.exception {
        println!("  error: {}", exception.message);
        if let Some(cause) = &exception.cause {
            println!("  caused by: {}", cause);
        }
    }
    for frame in &snapshot.variables {
        if frame.variables.is_empty() {
            continue;
        }
        println!("  frame {}:", frame.idx);
        for var in &frame.variables {
            println!("    {}", format_variable(var));
        }
    }
}

fn print_variables(variables: Vec<Variable>) {
    if variables.is_empty() {
        println!("No variables");
        return;
    }
    for var in &variables {
        println!("  {}", format_variable(var));
    }
}

fn print_list(list: &ListVariable) {
    println!("{}: list[{}]", list.id, list.length);
    for slice in &list.slices {
        for (offset, value) in slice.values.iter().enumerate() {
            println!("  [{}] {}", slice.start_idx + offset as i64, value);
        }
    }
}

fn format_variable(var: &Variable) -> String {
    match var {
        Variable::Scalar(v) => format!("{} = {}", v.id, v.value),
        Variable::List(v) => format!("{}: list[{}]", v.id, v.length),
    }
}
