//! The compression service: the surface callers use to run work.

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::context::SchedulerContext;
use crate::error::CoreResult;
use crate::fallback::{CompressionSettings, ExecutorRegistry};
use crate::memory::MemorySnapshot;
use crate::progress::ProgressSink;
use crate::scheduler::{BatchScheduler, ConcurrencyLimits, FileInput, JobId, JobResult};

/// Entry point for submitting and cancelling compression work.
///
/// Cheap to clone; clones share the same scheduler context, so limits and
/// cancellation apply across every batch submitted through any clone.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use squash_core::{CompressionService, CompressionSettings, ExecutorRegistry, SchedulerConfig};
/// use squash_core::progress::NullProgressSink;
///
/// # async fn run(inputs: Vec<squash_core::FileInput>) -> squash_core::CoreResult<()> {
/// let service = CompressionService::from_config(SchedulerConfig::from_env(), ExecutorRegistry::new())?;
/// let results = service
///     .submit_batch(inputs, CompressionSettings::default(), Arc::new(NullProgressSink))
///     .await;
/// for result in &results {
///     println!("{}: {:?}", result.name, result.status);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CompressionService {
    ctx: Arc<SchedulerContext>,
    batches: BatchScheduler,
}

impl CompressionService {
    pub fn new(ctx: SchedulerContext) -> Self {
        let ctx = Arc::new(ctx);
        Self {
            batches: BatchScheduler::new(Arc::clone(&ctx)),
            ctx,
        }
    }

    /// Builds a service over the host's memory and capabilities.
    pub fn from_config(config: SchedulerConfig, executors: ExecutorRegistry) -> CoreResult<Self> {
        Ok(Self::new(SchedulerContext::from_config(config, executors)?))
    }

    /// Runs `files` as one batch. One result per file, in completion order.
    pub async fn submit_batch(
        &self,
        files: Vec<FileInput>,
        settings: CompressionSettings,
        sink: Arc<dyn ProgressSink>,
    ) -> Vec<JobResult> {
        self.batches.run_batch(files, settings, sink).await
    }

    /// Runs a single file, waiting for an admission slot if necessary.
    pub async fn submit_job(
        &self,
        file: FileInput,
        settings: CompressionSettings,
        sink: Arc<dyn ProgressSink>,
    ) -> JobResult {
        self.batches.run_single(file, settings, sink).await
    }

    /// Cancels every running and queued job. Work submitted afterwards is
    /// cancelled too, until `reset_cancellation` is called.
    pub fn cancel_all(&self) {
        self.ctx.cancellation().cancel_all();
    }

    /// Cancels one job. Returns false if the job is unknown or already finished.
    pub fn cancel_job(&self, id: JobId) -> bool {
        self.ctx.cancellation().cancel_job(id)
    }

    /// Accepts new work again after `cancel_all`.
    pub fn reset_cancellation(&self) {
        self.ctx.cancellation().reset();
    }

    pub fn active_job_count(&self) -> usize {
        self.ctx.admission().active_job_count()
    }

    pub fn concurrency_limits(&self) -> ConcurrencyLimits {
        self.ctx.admission().limits()
    }

    /// Fresh memory snapshot, or `None` when introspection is unavailable.
    pub fn memory_snapshot(&self) -> Option<MemorySnapshot> {
        self.ctx.memory().snapshot()
    }

    pub fn context(&self) -> &Arc<SchedulerContext> {
        &self.ctx
    }
}
