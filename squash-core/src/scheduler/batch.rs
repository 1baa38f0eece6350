//! Batch Scheduler.
//!
//! Jobs wait in one FIFO queue per category. The dispatcher walks the
//! categories round-robin and offers the head of each queue to the
//! Admission Controller, so a saturated category never starves the others.
//! Admitted jobs run as tasks in a `JoinSet`; the dispatcher wakes on every
//! completion, on the admission poll interval and on cancel-all.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::task::JoinSet;

use super::admission::{AdmissionResult, AdmissionSlot, TryAdmit};
use super::{FileInput, Job, JobId, JobState, JobWarning, SupportLevel};
use crate::context::SchedulerContext;
use crate::error::{CoreError, JobError};
use crate::fallback::{CompressionSettings, MethodId, execute_with_fallback};
use crate::profile::Category;
use crate::progress::{JobProgress, ProgressEvent, ProgressSink, percent_of};

/// Terminal status of a job in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Outcome of one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub job_id: JobId,
    pub name: String,
    pub category: Category,
    pub status: JobStatus,
    /// Method that produced the output, for completed jobs.
    pub method: Option<MethodId>,
    pub input_size: u64,
    pub output_size: u64,
    pub chunks: usize,
    /// Chunk size in effect when the job finished; the whole input when it
    /// was not streamed.
    pub chunk_size: u64,
    pub warnings: Vec<JobWarning>,
    pub error: Option<JobError>,
    pub elapsed: Duration,
    /// Chunk outputs concatenated in index order.
    #[serde(skip)]
    pub output: Vec<u8>,
}

impl JobResult {
    fn unfinished(meta: &JobMeta, status: JobStatus, warnings: Vec<JobWarning>) -> Self {
        Self {
            job_id: meta.id,
            name: meta.name.clone(),
            category: meta.category,
            status,
            method: None,
            input_size: meta.size,
            output_size: 0,
            chunks: 0,
            chunk_size: 0,
            warnings,
            error: None,
            elapsed: meta.submitted.elapsed(),
            output: Vec::new(),
        }
    }

    fn cancelled(meta: &JobMeta, warnings: Vec<JobWarning>) -> Self {
        Self::unfinished(meta, JobStatus::Cancelled, warnings)
    }

    fn failed(meta: &JobMeta, error: JobError, warnings: Vec<JobWarning>) -> Self {
        let mut result = Self::unfinished(meta, JobStatus::Failed, warnings);
        result.error = Some(error);
        result
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

/// Identifying data of a job, kept by the dispatcher while the job runs.
#[derive(Debug, Clone)]
struct JobMeta {
    id: JobId,
    name: String,
    category: Category,
    size: u64,
    submitted: Instant,
}

impl JobMeta {
    fn of(job: &Job, submitted: Instant) -> Self {
        Self {
            id: job.id,
            name: job.name.clone(),
            category: job.category,
            size: job.file_size,
            submitted,
        }
    }
}

struct Pending {
    job: Job,
    warnings: Vec<JobWarning>,
    submitted: Instant,
}

/// Runs batches of jobs against a shared `SchedulerContext`.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    ctx: Arc<SchedulerContext>,
}

impl BatchScheduler {
    pub fn new(ctx: Arc<SchedulerContext>) -> Self {
        Self { ctx }
    }

    /// Runs every input to a terminal state and returns one result per input.
    ///
    /// Results come back in completion order; correlate them by `job_id`.
    /// A failing or panicking job never aborts its siblings.
    pub async fn run_batch(
        &self,
        inputs: Vec<FileInput>,
        settings: CompressionSettings,
        sink: Arc<dyn ProgressSink>,
    ) -> Vec<JobResult> {
        let total = inputs.len();
        let mut tracker = BatchTracker {
            ctx: &self.ctx,
            sink: Arc::clone(&sink),
            results: Vec::with_capacity(total),
            total,
        };
        if total == 0 {
            return tracker.results;
        }
        info!("Starting batch of {total} jobs");

        let mut queues: HashMap<Category, VecDeque<Pending>> = HashMap::new();
        for input in inputs {
            let submitted = Instant::now();
            let id = self.ctx.next_job_id();
            let token = self.ctx.cancellation().register(id);
            let job = Job::new(id, input, token);
            let mut warnings = Vec::new();

            match job.support {
                SupportLevel::Unsupported => {
                    tracker.finish(reject_unsupported(job, submitted, sink.as_ref()));
                    continue;
                }
                SupportLevel::Partial => warnings.push(JobWarning::PartialSupport),
                SupportLevel::Full => {}
            }

            queues.entry(job.category).or_default().push_back(Pending {
                job,
                warnings,
                submitted,
            });
        }

        let global = self.ctx.cancellation().global_token();
        let poll = self.ctx.admission().poll_interval();
        let mut running: JoinSet<JobResult> = JoinSet::new();
        let mut in_flight: HashMap<JobId, JobMeta> = HashMap::new();
        let mut cursor = 0usize;

        loop {
            let cancel_all = global.is_cancelled();
            for pending in drain_cancelled(&mut queues, cancel_all) {
                let meta = JobMeta::of(&pending.job, pending.submitted);
                let mut job = pending.job;
                transition(&mut job, JobState::Cancelled, sink.as_ref());
                debug!("{} cancelled while queued", job.id);
                tracker.finish(JobResult::cancelled(&meta, pending.warnings));
            }

            if !cancel_all {
                self.dispatch(
                    &mut queues,
                    &mut cursor,
                    &mut running,
                    &mut in_flight,
                    &settings,
                    &sink,
                    &mut tracker,
                );
            }

            let queued = queues.values().any(|queue| !queue.is_empty());
            if !queued && running.is_empty() {
                break;
            }

            tokio::select! {
                joined = running.join_next(), if !running.is_empty() => match joined {
                    Some(Ok(result)) => {
                        in_flight.remove(&result.job_id);
                        tracker.finish(result);
                    }
                    Some(Err(err)) => error!("Job task ended abnormally: {err}"),
                    None => {}
                },
                _ = tokio::time::sleep(poll), if queued => {}
                _ = global.cancelled(), if queued && !cancel_all => {}
            }
        }

        // Tasks that ended without a result still count as failures.
        let mut orphans: Vec<JobMeta> = in_flight.into_values().collect();
        orphans.sort_by_key(|meta| meta.id);
        for meta in orphans {
            let error = JobError::internal("job task ended without a result", meta.category);
            tracker.finish(JobResult::failed(&meta, error, Vec::new()));
        }

        info!("Batch finished: {} jobs", tracker.results.len());
        tracker.results
    }

    /// Runs one job outside a batch, waiting for admission as needed.
    ///
    /// Admission goes through `admit_or_wait`, so the call sleeps while the
    /// limits are saturated and returns a cancelled result if the job is
    /// cancelled while waiting.
    pub async fn run_single(
        &self,
        input: FileInput,
        settings: CompressionSettings,
        sink: Arc<dyn ProgressSink>,
    ) -> JobResult {
        let submitted = Instant::now();
        let id = self.ctx.next_job_id();
        let token = self.ctx.cancellation().register(id);
        let job = Job::new(id, input, token.clone());
        let mut warnings = Vec::new();

        let result = match job.support {
            SupportLevel::Unsupported => reject_unsupported(job, submitted, sink.as_ref()),
            support => {
                if support == SupportLevel::Partial {
                    warnings.push(JobWarning::PartialSupport);
                }
                let admitted = self
                    .ctx
                    .admission()
                    .admit_or_wait(job.category, job.file_size, &token)
                    .await;
                let pending = Pending {
                    job,
                    warnings,
                    submitted,
                };
                match admitted {
                    AdmissionResult::Admitted(slot) => {
                        let meta = JobMeta::of(&pending.job, submitted);
                        let ctx = Arc::clone(&self.ctx);
                        run_guarded(ctx, pending, slot, settings, Arc::clone(&sink), meta).await
                    }
                    AdmissionResult::MemoryExhausted {
                        required,
                        available,
                    } => refuse_for_memory(pending, required, available, sink.as_ref()),
                    AdmissionResult::Cancelled => {
                        let meta = JobMeta::of(&pending.job, submitted);
                        let mut job = pending.job;
                        transition(&mut job, JobState::Cancelled, sink.as_ref());
                        JobResult::cancelled(&meta, pending.warnings)
                    }
                }
            }
        };

        self.ctx.cancellation().unregister(result.job_id);
        log_result(&result);
        sink.on_event(ProgressEvent::JobFinished {
            job_id: result.job_id,
            status: result.status,
        });
        result
    }

    /// One round-robin pass, repeated while it keeps admitting jobs.
    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &self,
        queues: &mut HashMap<Category, VecDeque<Pending>>,
        cursor: &mut usize,
        running: &mut JoinSet<JobResult>,
        in_flight: &mut HashMap<JobId, JobMeta>,
        settings: &CompressionSettings,
        sink: &Arc<dyn ProgressSink>,
        tracker: &mut BatchTracker<'_>,
    ) {
        let admission = self.ctx.admission();
        loop {
            let mut progressed = false;
            for step in 0..Category::ALL.len() {
                let category = Category::ALL[(*cursor + step) % Category::ALL.len()];
                let Some(queue) = queues.get_mut(&category) else {
                    continue;
                };
                let Some(head) = queue.front() else {
                    continue;
                };

                match admission.try_admit(category, head.job.file_size) {
                    TryAdmit::Admitted(slot) => {
                        let Some(pending) = queue.pop_front() else {
                            continue;
                        };
                        progressed = true;
                        let meta = JobMeta::of(&pending.job, pending.submitted);
                        in_flight.insert(meta.id, meta.clone());
                        let ctx = Arc::clone(&self.ctx);
                        let settings = settings.clone();
                        let sink = Arc::clone(sink);
                        running.spawn(run_guarded(ctx, pending, slot, settings, sink, meta));
                    }
                    TryAdmit::MemoryExhausted {
                        required,
                        available,
                    } => {
                        let Some(pending) = queue.pop_front() else {
                            continue;
                        };
                        progressed = true;
                        tracker.finish(refuse_for_memory(
                            pending,
                            required,
                            available,
                            sink.as_ref(),
                        ));
                    }
                    TryAdmit::Saturated => {}
                }
            }
            *cursor = (*cursor + 1) % Category::ALL.len();
            if !progressed {
                break;
            }
        }
    }
}

/// Collects results and emits the per-completion events.
struct BatchTracker<'a> {
    ctx: &'a SchedulerContext,
    sink: Arc<dyn ProgressSink>,
    results: Vec<JobResult>,
    total: usize,
}

impl BatchTracker<'_> {
    fn finish(&mut self, result: JobResult) {
        self.ctx.cancellation().unregister(result.job_id);
        log_result(&result);

        self.sink.on_event(ProgressEvent::JobFinished {
            job_id: result.job_id,
            status: result.status,
        });
        self.results.push(result);
        let completed = self.results.len();
        self.sink.on_event(ProgressEvent::BatchProgress {
            completed,
            total: self.total,
            percent: percent_of(completed as u64, self.total as u64),
        });
    }
}

fn log_result(result: &JobResult) {
    match result.status {
        JobStatus::Completed => info!(
            "{} ({}) completed with '{}' in {:.2?}",
            result.job_id,
            result.name,
            result.method.as_ref().map(MethodId::as_str).unwrap_or("-"),
            result.elapsed
        ),
        JobStatus::Failed => error!(
            "{} ({}) failed: {}",
            result.job_id,
            result.name,
            result
                .error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default()
        ),
        JobStatus::Cancelled => info!("{} ({}) cancelled", result.job_id, result.name),
    }
}

fn job_error(err: &CoreError, category: Category) -> JobError {
    JobError::from_core(err, category)
        .unwrap_or_else(|| JobError::internal(err.to_string(), category))
}

/// Applies a lifecycle transition and reports it to the sink.
fn transition(job: &mut Job, next: JobState, sink: &dyn ProgressSink) {
    if job.set_state(next) {
        sink.on_event(ProgressEvent::StateChanged {
            job_id: job.id,
            state: job.state(),
        });
    }
}

/// Fails a job the format provider does not support. It is never admitted.
fn reject_unsupported(mut job: Job, submitted: Instant, sink: &dyn ProgressSink) -> JobResult {
    transition(&mut job, JobState::Failed, sink);
    let meta = JobMeta::of(&job, submitted);
    let err = CoreError::UnsupportedInput(job.name.clone());
    warn!("{} ({}) rejected: {err}", job.id, job.name);
    JobResult::failed(&meta, job_error(&err, job.category), Vec::new())
}

/// Fails a job whose estimated cost exceeds available memory.
fn refuse_for_memory(
    pending: Pending,
    required: u64,
    available: u64,
    sink: &dyn ProgressSink,
) -> JobResult {
    let meta = JobMeta::of(&pending.job, pending.submitted);
    let mut job = pending.job;
    transition(&mut job, JobState::Failed, sink);
    let err = CoreError::MemoryExhausted {
        category: job.category,
        required,
        available,
    };
    warn!("{} ({}) refused: {err}", job.id, job.name);
    JobResult::failed(&meta, job_error(&err, job.category), pending.warnings)
}

/// Runs an admitted job, turning a panic into a failed result.
async fn run_guarded(
    ctx: Arc<SchedulerContext>,
    pending: Pending,
    slot: AdmissionSlot,
    settings: CompressionSettings,
    sink: Arc<dyn ProgressSink>,
    meta: JobMeta,
) -> JobResult {
    let job = run_job(ctx, pending, slot, settings, sink);
    match AssertUnwindSafe(job).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!("{} panicked: {message}", meta.id);
            let error = JobError::internal(format!("job panicked: {message}"), meta.category);
            JobResult::failed(&meta, error, Vec::new())
        }
    }
}

fn drain_cancelled(
    queues: &mut HashMap<Category, VecDeque<Pending>>,
    all: bool,
) -> Vec<Pending> {
    let mut drained = Vec::new();
    for category in Category::ALL {
        let Some(queue) = queues.get_mut(&category) else {
            continue;
        };
        if all {
            drained.extend(queue.drain(..));
        } else if queue.iter().any(|pending| pending.job.cancel_requested()) {
            let (cancelled, kept): (VecDeque<_>, VecDeque<_>) = queue
                .drain(..)
                .partition(|pending| pending.job.cancel_requested());
            *queue = kept;
            drained.extend(cancelled);
        }
    }
    drained
}

/// Runs one admitted job. The slot is released before the result is built.
async fn run_job(
    ctx: Arc<SchedulerContext>,
    pending: Pending,
    slot: AdmissionSlot,
    settings: CompressionSettings,
    sink: Arc<dyn ProgressSink>,
) -> JobResult {
    let Pending {
        mut job,
        mut warnings,
        submitted,
    } = pending;
    let meta = JobMeta::of(&job, submitted);
    let progress = JobProgress::new(job.id, sink);
    for warning in &warnings {
        progress.warn(warning.clone());
    }

    let sink = Arc::clone(progress.sink());
    transition(&mut job, JobState::Admitted, sink.as_ref());
    if job.cancel_requested() {
        transition(&mut job, JobState::Cancelling, sink.as_ref());
        drop(slot);
        transition(&mut job, JobState::Cancelled, sink.as_ref());
        return JobResult::cancelled(&meta, warnings);
    }
    transition(&mut job, JobState::Running, sink.as_ref());

    let chain = ctx.resolver().resolve(job.category, ctx.capabilities());
    debug!("{} fallback chain: {}", job.id, chain);
    let outcome = execute_with_fallback(
        &job,
        &chain,
        ctx.executors(),
        ctx.streaming(),
        &settings,
        &progress,
        &mut warnings,
    )
    .await;

    // Cancelling covers the window between observing the cancel and giving
    // the slot back.
    if matches!(outcome, Err(CoreError::Cancelled)) {
        transition(&mut job, JobState::Cancelling, sink.as_ref());
    }
    drop(slot);

    match outcome {
        Ok((method, report)) => {
            transition(&mut job, JobState::Completed, sink.as_ref());
            let chunks = report.chunks.len();
            let chunk_size = report.final_chunk_size;
            let output = report.into_output();
            JobResult {
                job_id: job.id,
                name: job.name,
                category: job.category,
                status: JobStatus::Completed,
                method: Some(method),
                input_size: job.file_size,
                output_size: output.len() as u64,
                chunks,
                chunk_size,
                warnings,
                error: None,
                elapsed: submitted.elapsed(),
                output,
            }
        }
        Err(CoreError::Cancelled) => {
            transition(&mut job, JobState::Cancelled, sink.as_ref());
            JobResult::cancelled(&meta, warnings)
        }
        Err(err) => {
            transition(&mut job, JobState::Failed, sink.as_ref());
            JobResult::failed(&meta, job_error(&err, job.category), warnings)
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
