// ============================================================================
// squash-cli/src/logging.rs
// ============================================================================
//
// LOGGING UTILITIES: Logger Setup and Helper Functions
//
// The CLI logs through the standard `log` crate. Console-only runs use
// `env_logger`; runs with `--log-file` hand over to the core's log4rs setup
// so the same lines also land in the file.
//
// USAGE:
// - RUST_LOG=info (default): Normal operation logs
// - RUST_LOG=debug or --verbose: Detailed scheduling decisions
// - RUST_LOG=trace: Very verbose debugging information

use std::path::Path;

use anyhow::Context;
use log::LevelFilter;

use crate::config::DEFAULT_LOG_LEVEL;

/// Initializes logging for the process.
///
/// `--verbose` forces debug level. Otherwise RUST_LOG is honoured, falling
/// back to `DEFAULT_LOG_LEVEL`.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    if let Some(path) = log_file {
        return squash_core::logging::init_file_logging(path, level)
            .with_context(|| format!("Failed to set up log file '{}'", path.display()));
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_LOG_LEVEL));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
    Ok(())
}

/// Returns the current local timestamp formatted as "YYYYMMDD_HHMMSS".
///
/// Used to name simulation runs in the log.
pub fn get_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}
