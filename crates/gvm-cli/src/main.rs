mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gvm_core::Error;

#[derive(Parser)]
#[command(name = "gvm")]
#[command(about = "Declarative lifecycle management for a single Compute Engine VM", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the VM configuration record
    #[arg(short, long, env = "GVM_CONFIG", default_value = gvm_core::record::DEFAULT_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the VM, or converge an existing one, per the record
    Create,
    /// Start a stopped VM
    Start,
    /// Stop a running VM
    Stop,
    /// Hard-reset the VM
    Restart,
    /// Print the provider-reported state
    Status,
    /// Print connection details (SSH command, external IP, HTTP URL)
    Info,
    /// Print the declared configuration and current status
    Summary,
    /// Delete the VM
    Destroy {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(exit_code(&e))
        }
    }
}

/// 1 for validation and provider failures, 2 when an operation required a
/// resource that does not exist.
fn exit_code(err: &Error) -> u8 {
    match err {
        Error::NotFound(_) => 2,
        _ => 1,
    }
}
