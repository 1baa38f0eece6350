// squash-cli/src/commands/simulate.rs
//
// Implements the `simulate` subcommand: runs the real batch scheduler over
// the inputs, with every compression method replaced by a simulated executor
// that sleeps per chunk and shrinks its input by a fixed ratio. Methods can
// be forced to fail so fallback chains can be exercised on real hosts.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use indicatif::{MultiProgress, ProgressBar};
use log::{info, warn};
use serde::Serialize;
use squash_core::fallback::MethodTable;
use squash_core::progress::NullProgressSink;
use squash_core::utils::calculate_size_reduction;
use squash_core::{
    BatchSummary, Category, ChunkContext, CompressionExecutor, CompressionSettings,
    ExecutorError, ExecutorRegistry, JobId, JobResult, JobState, JobStatus, MethodId,
    ProgressEvent, ProgressSink, SchedulerConfig, discover_inputs, format_bytes, format_duration,
};

use crate::cli::SimulateArgs;
use crate::config::SIMULATED_OUTPUT_RATIO;
use crate::logging::get_timestamp;
use crate::output::{
    batch_bar_style, job_bar_style, print_heading, print_info, print_section, styled_status,
};

// ============================================================================
// SIMULATED EXECUTORS
// ============================================================================

/// How a simulated method behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedBehavior {
    Succeed,
    Unavailable,
    Corrupt,
}

/// Stand-in for a real compression method.
#[derive(Debug)]
pub struct SimulatedExecutor {
    method: MethodId,
    behavior: SimulatedBehavior,
    chunk_delay: Duration,
}

impl SimulatedExecutor {
    pub fn new(method: MethodId, behavior: SimulatedBehavior, chunk_delay: Duration) -> Self {
        Self {
            method,
            behavior,
            chunk_delay,
        }
    }
}

#[async_trait]
impl CompressionExecutor for SimulatedExecutor {
    fn method(&self) -> MethodId {
        self.method.clone()
    }

    async fn process(
        &self,
        chunk: &[u8],
        ctx: &ChunkContext<'_>,
    ) -> Result<Vec<u8>, ExecutorError> {
        match self.behavior {
            SimulatedBehavior::Unavailable => {
                return Err(ExecutorError::environment_incapable(format!(
                    "{} is not available on this host",
                    self.method
                )));
            }
            SimulatedBehavior::Corrupt => {
                return Err(ExecutorError::data_invalid(format!(
                    "{} rejected chunk {} as corrupt",
                    self.method, ctx.index
                )));
            }
            SimulatedBehavior::Succeed => {}
        }

        if !self.chunk_delay.is_zero() {
            tokio::time::sleep(self.chunk_delay).await;
        }

        let keep = ((chunk.len() as f64) * SIMULATED_OUTPUT_RATIO).ceil() as usize;
        Ok(chunk[..keep.min(chunk.len())].to_vec())
    }
}

/// Registers a simulated executor for every method of `table`.
pub fn simulated_registry(
    table: &MethodTable,
    unavailable: &[String],
    corrupt: &[String],
    chunk_delay: Duration,
) -> ExecutorRegistry {
    let known: BTreeSet<&str> = Category::ALL
        .into_iter()
        .flat_map(|category| table.methods(category))
        .map(|spec| spec.id.as_str())
        .collect();

    for name in unavailable.iter().chain(corrupt) {
        if !known.contains(name.as_str()) {
            warn!("Unknown method '{name}' ignored");
        }
    }

    let mut registry = ExecutorRegistry::new();
    for name in known {
        let behavior = if corrupt.iter().any(|m| m == name) {
            SimulatedBehavior::Corrupt
        } else if unavailable.iter().any(|m| m == name) {
            SimulatedBehavior::Unavailable
        } else {
            SimulatedBehavior::Succeed
        };
        registry.register(Arc::new(SimulatedExecutor::new(
            MethodId::new(name),
            behavior,
            chunk_delay,
        )));
    }
    registry
}

// ============================================================================
// PROGRESS BARS
// ============================================================================

/// Renders scheduler events as one bar per job plus a batch bar.
pub struct BarProgressSink {
    multi: MultiProgress,
    batch: ProgressBar,
    jobs: Mutex<HashMap<JobId, ProgressBar>>,
}

impl BarProgressSink {
    pub fn new(total_jobs: usize) -> Self {
        let multi = MultiProgress::new();
        let batch = multi.add(ProgressBar::new(total_jobs as u64));
        batch.set_style(batch_bar_style());
        batch.set_prefix("Batch");
        Self {
            multi,
            batch,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    fn job_bar(&self, job_id: JobId) -> Option<ProgressBar> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&job_id)
            .cloned()
    }

    pub fn finish(&self) {
        self.batch.finish();
    }
}

impl ProgressSink for BarProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::JobStarted {
                job_id,
                name,
                method,
                ..
            } => {
                let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
                let bar = jobs.entry(job_id).or_insert_with(|| {
                    let bar = self.multi.insert_before(&self.batch, ProgressBar::new(100));
                    bar.set_style(job_bar_style());
                    bar
                });
                bar.set_message(format!("{name} ({method})"));
            }
            ProgressEvent::JobProgress { job_id, percent } => {
                if let Some(bar) = self.job_bar(job_id) {
                    bar.set_position(u64::from(percent));
                }
            }
            ProgressEvent::JobFinished { job_id, status } => {
                if let Some(bar) = self.job_bar(job_id) {
                    if status != JobStatus::Completed {
                        bar.abandon_with_message(format!("{job_id} {status}"));
                    } else {
                        bar.finish();
                    }
                }
            }
            ProgressEvent::StateChanged {
                job_id,
                state: JobState::Cancelling,
            } => {
                if let Some(bar) = self.job_bar(job_id) {
                    bar.set_message(format!("{job_id} cancelling"));
                }
            }
            ProgressEvent::StateChanged { .. } => {}
            ProgressEvent::BatchProgress { completed, .. } => {
                self.batch.set_position(completed as u64);
            }
            ProgressEvent::Warning { job_id, warning } => {
                // println keeps the bars intact; it is a no-op when hidden
                let _ = self.multi.println(format!("warning: {job_id}: {warning}"));
            }
        }
    }
}

// ============================================================================
// COMMAND
// ============================================================================

#[derive(Serialize)]
struct SimulationReport<'a> {
    summary: &'a BatchSummary,
    results: &'a [JobResult],
}

pub async fn run_simulate(config: SchedulerConfig, args: SimulateArgs) -> anyhow::Result<()> {
    let inputs = discover_inputs(&args.inputs).await?;
    let table = MethodTable::default();
    let registry = simulated_registry(
        &table,
        &args.unavailable,
        &args.corrupt,
        Duration::from_millis(args.chunk_delay_ms),
    );
    let service = super::build_service(config, table, registry)?;

    info!(
        "Simulation {} starting with {} input(s)",
        get_timestamp(),
        inputs.len()
    );

    let watcher = {
        let service = service.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling all jobs");
                service.cancel_all();
            }
        })
    };

    let results = if args.json {
        service
            .submit_batch(inputs, CompressionSettings::default(), Arc::new(NullProgressSink))
            .await
    } else {
        let bars = Arc::new(BarProgressSink::new(inputs.len()));
        let sink: Arc<dyn ProgressSink> = bars.clone();
        let results = service
            .submit_batch(inputs, CompressionSettings::default(), sink)
            .await;
        bars.finish();
        results
    };
    watcher.abort();

    let summary = BatchSummary::from_results(&results);

    if args.json {
        let report = SimulationReport {
            summary: &summary,
            results: &results,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_results(&results);
        print_heading("Batch Summary");
        println!("{summary}");
    }

    if summary.all_succeeded() {
        Ok(())
    } else {
        Err(anyhow!(
            "{} of {} job(s) did not complete",
            summary.failed + summary.cancelled,
            summary.total_jobs
        ))
    }
}

fn print_results(results: &[JobResult]) {
    for result in results {
        print_section(&result.name);
        print_info("Status", styled_status(result.status));
        print_info("Category", result.category);
        if let Some(method) = &result.method {
            print_info("Method", method);
        }
        if result.status == JobStatus::Completed {
            print_info(
                "Size",
                format!(
                    "{} -> {} ({:.1}% smaller)",
                    format_bytes(result.input_size),
                    format_bytes(result.output_size),
                    calculate_size_reduction(result.input_size, result.output_size)
                ),
            );
            print_info(
                "Chunks",
                format!("{} x {}", result.chunks, format_bytes(result.chunk_size)),
            );
        }
        print_info("Time", format_duration(result.elapsed.as_secs_f64()));
        for warning in &result.warnings {
            print_info("Warning", warning);
        }
        if let Some(error) = &result.error {
            print_info("Error", error);
        }
    }
}
