//! Block Runtime - execution environment and debugger for block programs
//!
//! `serve` hosts the runtime and waits for a controller on a local socket.
//! The other subcommands act as a one-shot controller.

use block_runtime::common::{config::Config, logging};
use block_runtime::runtime::{ProgramHandler, RuntimeServer};
use block_runtime::{cli, commands, Result};
use clap::Parser;
use commands::Commands;

#[derive(Parser)]
#[command(name = "block-runtime", about = "Runtime and debugger for block programs")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { text_output } => {
            if let Some(log_file) = logging::init_runtime() {
                tracing::info!(log = %log_file.display(), "Logging to file");
            }
            serve(text_output).await
        }
        command => {
            logging::init_cli();
            cli::dispatch(command).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn serve(text_output: bool) -> Result<()> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        "Starting block runtime"
    );

    let mut config = Config::load()?;
    if text_output {
        config.runtime.text_output_enabled = true;
    }

    let handler = ProgramHandler::new(&config);
    handler.start()?;
    RuntimeServer::new(handler).run().await
}
