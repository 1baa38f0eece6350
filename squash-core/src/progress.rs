// ============================================================================
// squash-core/src/progress.rs
// ============================================================================
//
// PROGRESS REPORTING: Job and Batch Progress Events
//
// This module defines the events the scheduler reports while it works and
// the sink interface consumers implement to receive them.
//
// KEY COMPONENTS:
// - ProgressEvent: Enum of job/batch progress events
// - ProgressSink: Trait for receiving progress events
// - NullProgressSink / CallbackProgressSink / ChannelProgressSink
// - JobProgress: Per-job reporter that keeps percentages non-decreasing

// ---- Standard library imports ----
use std::sync::Arc;
use std::sync::atomic::{AtomicI16, Ordering};

// ---- External crate imports ----
use log::debug;
use tokio::sync::mpsc;

// ---- Internal crate imports ----
use crate::fallback::MethodId;
use crate::profile::Category;
use crate::scheduler::{JobId, JobState, JobStatus, JobWarning};

// ============================================================================
// PROGRESS EVENTS
// ============================================================================

/// Events reported while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A job was admitted and started with a method.
    JobStarted {
        job_id: JobId,
        name: String,
        category: Category,
        method: MethodId,
    },

    /// Progress of one job (0 to 100). Never decreases for a given job.
    JobProgress { job_id: JobId, percent: u8 },

    /// A job moved to a new lifecycle state.
    StateChanged { job_id: JobId, state: JobState },

    /// A job reached a terminal state.
    JobFinished { job_id: JobId, status: JobStatus },

    /// Batch-level progress, recomputed after every job completion.
    BatchProgress {
        completed: usize,
        total: usize,
        percent: u8,
    },

    /// A non-fatal condition on a job.
    Warning { job_id: JobId, warning: JobWarning },
}

// ============================================================================
// PROGRESS SINKS
// ============================================================================

/// Receiver of progress events.
pub trait ProgressSink: Send + Sync {
    /// Called when a progress event occurs.
    fn on_event(&self, event: ProgressEvent);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_event(&self, _event: ProgressEvent) {}
}

type JobCallback = Box<dyn Fn(JobId, u8) + Send + Sync>;
type BatchCallback = Box<dyn Fn(usize, usize, u8) + Send + Sync>;

/// Sink forwarding job and batch percentages to two separate closures.
#[derive(Default)]
pub struct CallbackProgressSink {
    on_job: Option<JobCallback>,
    on_batch: Option<BatchCallback>,
}

impl CallbackProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with `(job_id, percent)` on every job progress event.
    pub fn on_job_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(JobId, u8) + Send + Sync + 'static,
    {
        self.on_job = Some(Box::new(callback));
        self
    }

    /// Called with `(completed, total, percent)` after every job completion.
    pub fn on_batch_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize, u8) + Send + Sync + 'static,
    {
        self.on_batch = Some(Box::new(callback));
        self
    }
}

impl ProgressSink for CallbackProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::JobProgress { job_id, percent } => {
                if let Some(callback) = &self.on_job {
                    callback(job_id, percent);
                }
            }
            ProgressEvent::BatchProgress {
                completed,
                total,
                percent,
            } => {
                if let Some(callback) = &self.on_batch {
                    callback(completed, total, percent);
                }
            }
            _ => {}
        }
    }
}

/// Sink pushing events into a bounded channel.
///
/// Events are dropped when the channel is full, so a slow consumer never
/// stalls the scheduler. Delivered events keep their order.
#[derive(Debug, Clone)]
pub struct ChannelProgressSink {
    sender: mpsc::Sender<ProgressEvent>,
}

impl ChannelProgressSink {
    /// Creates a sink and the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        if let Err(err) = self.sender.try_send(event) {
            debug!("Progress event dropped: {err}");
        }
    }
}

// ============================================================================
// REPORTERS
// ============================================================================

/// Per-job progress reporter.
///
/// Suppresses values that do not exceed the last one reported, so a job
/// restarted on a fallback method never appears to move backwards.
pub struct JobProgress {
    job_id: JobId,
    sink: Arc<dyn ProgressSink>,
    last: AtomicI16,
}

impl JobProgress {
    pub fn new(job_id: JobId, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            job_id,
            sink,
            last: AtomicI16::new(-1),
        }
    }

    /// Reports `percent` (clamped to 100) if it advances the job.
    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        let previous = self.last.fetch_max(i16::from(percent), Ordering::AcqRel);
        if i16::from(percent) > previous {
            self.sink.on_event(ProgressEvent::JobProgress {
                job_id: self.job_id,
                percent,
            });
        }
    }

    /// Last percentage reported, if any.
    pub fn last_reported(&self) -> Option<u8> {
        u8::try_from(self.last.load(Ordering::Acquire)).ok()
    }

    pub fn warn(&self, warning: JobWarning) {
        self.sink.on_event(ProgressEvent::Warning {
            job_id: self.job_id,
            warning,
        });
    }

    pub fn sink(&self) -> &Arc<dyn ProgressSink> {
        &self.sink
    }
}

/// `round(done / total * 100)`, with an empty total counting as complete.
pub fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done as f64 / total as f64) * 100.0).round().min(100.0) as u8
}
