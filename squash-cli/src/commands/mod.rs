// squash-cli/src/commands/mod.rs
//
// Command implementations for the Squash CLI.

/// Shows memory, concurrency limits and capabilities.
pub mod limits;

/// Prints the scheduling plan for a set of inputs.
pub mod plan;

/// Runs a batch with simulated executors.
pub mod simulate;

use squash_core::context::SchedulerContext;
use squash_core::fallback::{FallbackResolver, MethodTable};
use squash_core::{CompressionService, ExecutorRegistry, SchedulerConfig};

use crate::cli::Cli;

/// Layers the CLI flags over the config file and environment.
pub fn load_config(cli: &Cli) -> anyhow::Result<SchedulerConfig> {
    use anyhow::Context;

    let base = match &cli.config {
        Some(path) => SchedulerConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => SchedulerConfig::from_env(),
    };

    let mut builder = squash_core::SchedulerConfigBuilder::from_config(base);
    if let Some(jobs) = cli.max_concurrent {
        builder = builder.global_max_concurrent(jobs);
    }
    if let Some(bytes) = cli.memory_limit {
        builder = builder.memory_limit_bytes(bytes);
    }
    Ok(builder.build()?)
}

/// Builds a service probing the host, resolving fallback chains from `table`.
pub fn build_service(
    config: SchedulerConfig,
    table: MethodTable,
    executors: ExecutorRegistry,
) -> anyhow::Result<CompressionService> {
    let ctx = SchedulerContext::from_config(config, executors)?
        .with_resolver(FallbackResolver::new(table));
    Ok(CompressionService::new(ctx))
}
