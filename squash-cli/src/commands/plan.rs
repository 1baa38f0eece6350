// squash-cli/src/commands/plan.rs
//
// Implements the `plan` subcommand: shows how each input would be admitted,
// chunked and compressed, without running any executor.

use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;
use squash_core::fallback::MethodTable;
use squash_core::streaming::{chunk_count, recommend_chunk_size};
use squash_core::utils::get_filename_safe;
use squash_core::{
    Category, CompressionService, ExecutorRegistry, SchedulerConfig, find_processable_files,
    format_bytes,
};

use crate::cli::PlanArgs;
use crate::output::{print_heading, print_info, print_section};

/// How one input would be scheduled.
#[derive(Debug, Clone, Serialize)]
pub struct PlanRow {
    pub path: PathBuf,
    pub name: String,
    pub category: Category,
    pub size: u64,
    pub estimated_cost: u64,
    pub streaming: bool,
    pub chunk_size: u64,
    pub chunks: usize,
    pub fallback_chain: Vec<String>,
}

/// Computes the plan rows for `paths` against the service's view of the host.
pub fn build_plan(service: &CompressionService, paths: &[PathBuf]) -> anyhow::Result<Vec<PlanRow>> {
    let ctx = service.context();
    let snapshot = service.memory_snapshot();

    let mut rows = Vec::new();
    for (path, category) in find_processable_files(paths)? {
        let size = std::fs::metadata(&path)
            .with_context(|| format!("Failed to read metadata for '{}'", path.display()))?
            .len();
        let profile = ctx.profiles().get(category);

        let streaming = size > profile.streaming_threshold;
        let chunk_size = if streaming {
            recommend_chunk_size(size, &profile, snapshot.as_ref())
        } else {
            size
        };
        let chunks = if streaming {
            chunk_count(size, chunk_size)
        } else {
            1
        };

        let chain = ctx.resolver().resolve(category, ctx.capabilities());
        rows.push(PlanRow {
            name: get_filename_safe(&path)?,
            path,
            category,
            size,
            estimated_cost: ctx.admission().estimate_cost(category, size),
            streaming,
            chunk_size,
            chunks,
            fallback_chain: chain.iter().map(|id| id.as_str().to_string()).collect(),
        });
    }
    Ok(rows)
}

pub fn run_plan(config: SchedulerConfig, args: PlanArgs) -> anyhow::Result<()> {
    let service = super::build_service(config, MethodTable::default(), ExecutorRegistry::new())?;
    let rows = build_plan(&service, &args.inputs)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    print_heading("Compression Plan");
    for row in &rows {
        print_section(&row.name);
        print_info("Category", row.category);
        print_info("Size", format_bytes(row.size));
        print_info("Estimated memory", format_bytes(row.estimated_cost));
        if row.streaming {
            print_info(
                "Streaming",
                format!("yes, {} chunks of {}", row.chunks, format_bytes(row.chunk_size)),
            );
        } else {
            print_info("Streaming", "no");
        }
        if row.fallback_chain.is_empty() {
            print_info("Fallback chain", "(no usable method)");
        } else {
            print_info("Fallback chain", row.fallback_chain.join(" -> "));
        }
    }
    Ok(())
}
