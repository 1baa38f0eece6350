// squash-cli/src/commands/limits.rs
//
// Implements the `limits` subcommand: reports what the scheduler sees on
// this host before any job is submitted.

use squash_core::fallback::MethodTable;
use squash_core::{ExecutorRegistry, SchedulerConfig, format_bytes};

use crate::output::{print_heading, print_info, print_section};

pub fn run_limits(config: SchedulerConfig) -> anyhow::Result<()> {
    let service = super::build_service(config, MethodTable::default(), ExecutorRegistry::new())?;
    let ctx = service.context();

    print_heading("Scheduler Limits");

    print_section("Memory");
    match service.memory_snapshot() {
        Some(snapshot) => {
            print_info("Total", format_bytes(snapshot.total_bytes));
            print_info("Limit", format_bytes(snapshot.limit_bytes));
            print_info("Used", format_bytes(snapshot.used_bytes));
            print_info("Available", format_bytes(snapshot.available_bytes()));
            print_info(
                "Pressure",
                format!(
                    "{:?} ({:.1}%)",
                    snapshot.pressure(),
                    snapshot.usage_percentage() * 100.0
                ),
            );
        }
        None => print_info("Memory", "unavailable"),
    }

    let limits = service.concurrency_limits();
    print_section("Concurrency");
    print_info("Global", limits.global_max);
    for (category, max) in &limits.per_category {
        let profile = ctx.profiles().get(*category);
        print_info(
            category.as_str(),
            format!(
                "{max} concurrent, x{:.1} memory, streams above {}",
                profile.memory_multiplier,
                format_bytes(profile.streaming_threshold)
            ),
        );
    }

    print_section("Capabilities");
    if ctx.capabilities().is_empty() {
        print_info("Detected", "none");
    } else {
        let flags: Vec<&str> = ctx.capabilities().iter().map(|c| c.flag()).collect();
        print_info("Detected", flags.join(", "));
    }

    Ok(())
}
