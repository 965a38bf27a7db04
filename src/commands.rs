//! CLI command definitions
//!
//! Defines the clap commands for the runtime and its controller client.

use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub enum Commands {
    /// Run the runtime and wait for a controller on the local socket
    Serve {
        /// Forward text output before a controller connects
        #[arg(long)]
        text_output: bool,
    },

    /// Show the effective configuration and file locations
    Config,

    /// List threads and their state
    Threads,

    /// Breakpoint management
    #[command(subcommand, alias = "b")]
    Breakpoint(BreakpointCommands),

    /// Suspend a thread at its next step
    Suspend(ThreadArg),

    /// Resume a suspended thread
    #[command(alias = "c")]
    Resume(ThreadArg),

    /// Step over (stop at the next step at the same call depth or shallower)
    #[command(alias = "n")]
    Next {
        /// Thread ID
        thread_id: u64,
    },

    /// Step into (stop at the next step, including inside calls)
    #[command(alias = "s")]
    Step {
        /// Thread ID
        thread_id: u64,
    },

    /// Step out (run until the current call returns)
    #[command(alias = "out")]
    Finish {
        /// Thread ID
        thread_id: u64,
    },

    /// Show local variables of a suspended thread
    Locals {
        /// Thread ID
        thread_id: u64,

        /// Variable stack frame (0 = outermost)
        #[arg(long, default_value = "0")]
        frame: i64,
    },

    /// Show global variables
    Globals,

    /// Show elements of a list variable
    List {
        /// Variable symbol ID
        var_id: String,

        /// Read a local list of this suspended thread instead of a global
        #[arg(long)]
        thread: Option<u64>,

        /// Variable stack frame of the local list
        #[arg(long, default_value = "0")]
        frame: i64,

        /// First index (negative counts from the end)
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        start: i64,

        /// Number of elements (negative reads backwards from start)
        #[arg(long, default_value = "10", allow_hyphen_values = true)]
        length: i64,
    },

    /// List the entry points of the loaded program
    EntryPoints,

    /// Send a line of text input to the program
    Input {
        /// Text to send
        text: String,
    },

    /// Fire a program event
    Fire {
        /// Event name
        event: String,
    },

    /// Attach as the controller: print output and thread events as they arrive
    Console,

    /// View runtime logs
    Logs {
        /// Number of lines to show
        #[arg(long, short = 'n', default_value = "50")]
        lines: usize,

        /// Clear the log file
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand)]
pub enum BreakpointCommands {
    /// Add breakpoints
    Add {
        /// Block symbol IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Remove breakpoints
    #[command(alias = "rm")]
    Remove {
        /// Block symbol IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Replace all breakpoints (no IDs clears them)
    Set {
        /// Block symbol IDs
        ids: Vec<String>,
    },
}

/// Target of a suspend/resume command
#[derive(Args)]
pub struct ThreadArg {
    /// Thread ID
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub thread_id: Option<u64>,

    /// Apply to all threads
    #[arg(long)]
    pub all: bool,
}
