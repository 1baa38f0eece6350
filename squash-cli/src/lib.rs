// squash-cli/src/lib.rs
//
// Library portion of the Squash CLI application.
// Contains argument definitions and command logic.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod output;

// Re-export items needed by the binary or integration tests
pub use cli::{Cli, Commands, PlanArgs, SimulateArgs};
pub use commands::limits::run_limits;
pub use commands::plan::{PlanRow, build_plan, run_plan};
pub use commands::simulate::{SimulatedExecutor, run_simulate, simulated_registry};
