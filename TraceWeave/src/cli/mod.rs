//! TraceWeave CLI - command-line interface for the extraction pipeline

pub mod commands;
pub mod progress;

use clap::Parser;
use commands::Commands;

#[derive(Parser)]
#[command(name = "traceweave")]
#[command(about = "TraceWeave: dialog corpus extraction for RPG data dumps", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Run the TraceWeave CLI
pub fn run_cli() -> anyhow::Result<()> {
    // Setup logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    cli.command.execute()?;

    Ok(())
}
