// squash-cli/src/main.rs
//
// Entry point for the `squash` binary.
//
// Responsibilities include:
// - Parsing user-provided arguments.
// - Setting up logging to the console and, optionally, a log file.
// - Layering the scheduler config: file, environment, then flags.
// - Dispatching to the subcommand and mapping failures to the exit code.

use clap::Parser;
use log::{debug, error};
use std::process;

use squash_cli::commands::load_config;
use squash_cli::logging::init_logging;
use squash_cli::{Cli, Commands, run_limits, run_plan, run_simulate};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }

    if let Err(e) = run(cli).await {
        error!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    debug!("Scheduler config: {config:?}");

    match cli.command {
        Commands::Limits => run_limits(config),
        Commands::Plan(args) => run_plan(config, args),
        Commands::Simulate(args) => run_simulate(config, args).await,
    }
}
