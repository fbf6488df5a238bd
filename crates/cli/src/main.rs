/// Entry point for the selscope CLI, which recovers function selectors from EVM bytecode.
///
/// This module parses command-line arguments, installs logging and dispatches to the
/// subcommands for selector scanning, disassembly, CFG export and signature hashing.
use clap::Parser;
use selscope_cli::commands::{Cmd, Command};
use tracing_subscriber::EnvFilter;

/// Command-line interface for selscope.
#[derive(Parser)]
#[command(name = "selscope")]
#[command(about = "selscope: recover function selectors from EVM bytecode")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Input bytecode as a hex string (0x...) or file path prefixed with @; a function signature
    /// for the `selector` subcommand
    input: String,

    /// Log scan progress (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    cli.command.execute(&cli.input).await
}
