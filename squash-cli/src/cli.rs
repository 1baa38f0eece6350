// squash-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CHUNK_DELAY_MS;

// --- CLI Argument Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "Squash: resource-aware compression scheduler",
    long_about = "Inspects scheduler limits, plans compression jobs and simulates batches using the squash-core library."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional: JSON scheduler configuration file
    #[arg(long, global = true, value_name = "CONFIG_JSON")]
    pub config: Option<PathBuf>,

    /// Optional: Override the global concurrency limit (clamped to 1-4)
    #[arg(long, global = true, value_name = "JOBS")]
    pub max_concurrent: Option<usize>,

    /// Optional: Cap the memory limit, in bytes
    #[arg(long, global = true, value_name = "BYTES")]
    pub memory_limit: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Optional: Also write logs to this file
    #[arg(long, global = true, value_name = "LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Shows memory, concurrency limits and detected capabilities
    Limits,
    /// Shows how each input would be scheduled, without running anything
    Plan(PlanArgs),
    /// Runs the batch scheduler over the inputs with simulated executors
    Simulate(SimulateArgs),
}

#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Input files or directories
    #[arg(required = true, value_name = "INPUT_PATH")]
    pub inputs: Vec<PathBuf>,

    /// Print the plan as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Input files or directories
    #[arg(required = true, value_name = "INPUT_PATH")]
    pub inputs: Vec<PathBuf>,

    /// Delay applied to every simulated chunk, in milliseconds
    #[arg(long, value_name = "MILLIS", default_value_t = DEFAULT_CHUNK_DELAY_MS)]
    pub chunk_delay_ms: u64,

    /// Methods that report the environment as incapable (e.g. video-hardware)
    #[arg(long, value_delimiter = ',', value_name = "METHOD")]
    pub unavailable: Vec<String>,

    /// Methods that reject their input as invalid data
    #[arg(long, value_delimiter = ',', value_name = "METHOD")]
    pub corrupt: Vec<String>,

    /// Print results and summary as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
