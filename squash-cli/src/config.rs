// squash-cli/src/config.rs
//
// Defines default configuration constants for the `squash-cli` application,
// primarily related to batch simulation.

/// Delay each simulated chunk takes unless `--chunk-delay-ms` is given.
pub const DEFAULT_CHUNK_DELAY_MS: u64 = 20;

/// Output size of a simulated chunk relative to its input.
pub const SIMULATED_OUTPUT_RATIO: f64 = 0.6;

/// Log level used when `--verbose` is not given and RUST_LOG is unset.
pub const DEFAULT_LOG_LEVEL: &str = "info";
