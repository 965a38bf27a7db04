//! Tracing setup
//!
//! The runtime usually runs detached, so it also writes `runtime.log`; the
//! one-shot controller commands only log to stderr.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::paths;

fn filter_or(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Stderr logging for controller subcommands
pub fn init_cli() {
    tracing_subscriber::registry()
        .with(filter_or("block_runtime=info,warn"))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact(),
        )
        .init();
}

/// File and stderr logging for `serve`
///
/// Returns the log file path, or `None` when only stderr could be set up.
pub fn init_runtime() -> Option<PathBuf> {
    let opened = open_log_file();
    let log_path = opened.as_ref().map(|(path, _)| path.clone());

    // Worker threads are named after their entry point, which is what makes
    // the file log readable
    let file_layer = opened.map(|(_, file)| {
        fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
    });

    tracing_subscriber::registry()
        .with(filter_or("block_runtime=debug,info"))
        .with(file_layer)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_names(log_path.is_none())
                .compact(),
        )
        .init();

    log_path
}

fn open_log_file() -> Option<(PathBuf, File)> {
    let path = paths::log_file()?;
    let dir = path.parent()?;
    let opened = std::fs::create_dir_all(dir)
        .and_then(|()| OpenOptions::new().create(true).append(true).open(&path));
    match opened {
        Ok(file) => Some((path, file)),
        Err(e) => {
            eprintln!("Warning: Could not open log file {}: {}", path.display(), e);
            None
        }
    }
}

/// Where `serve` writes its log
pub fn runtime_log_path() -> Option<PathBuf> {
    paths::log_file()
}
