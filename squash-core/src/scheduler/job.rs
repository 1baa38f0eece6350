//! Jobs and their lifecycle.

use std::fmt;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::fallback::MethodId;
use crate::memory::MemoryPressure;
use crate::profile::Category;
use crate::streaming::ByteSource;

/// Unique job identifier, displayed as `job-N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Admitted,
    Running,
    Cancelling,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    fn can_move_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Queued, Admitted | Cancelled | Failed) => true,
            (Admitted, Running | Cancelling | Failed) => true,
            (Running, Cancelling | Completed | Failed) => true,
            (Cancelling, Cancelled) => true,
            _ => false,
        }
    }
}

/// How well the format provider supports an input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportLevel {
    #[default]
    Full,
    Partial,
    Unsupported,
}

/// Non-fatal condition recorded against a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobWarning {
    /// Memory pressure rose and the chunk size was reduced.
    HighMemoryPressure { pressure: MemoryPressure, chunk_size: u64 },
    /// A method could not run here; the next one in the chain was tried.
    MethodUnavailable { method: MethodId, reason: String },
    /// The format provider only partially supports this input.
    PartialSupport,
}

impl fmt::Display for JobWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HighMemoryPressure {
                pressure,
                chunk_size,
            } => write!(f, "{pressure:?} memory pressure, chunk size reduced to {chunk_size} bytes"),
            Self::MethodUnavailable { method, reason } => {
                write!(f, "method '{method}' unavailable: {reason}")
            }
            Self::PartialSupport => write!(f, "format only partially supported"),
        }
    }
}

/// A file submitted for compression.
#[derive(Clone)]
pub struct FileInput {
    pub name: String,
    pub category: Category,
    pub support: SupportLevel,
    pub source: Arc<dyn ByteSource>,
}

impl FileInput {
    pub fn new(name: impl Into<String>, category: Category, source: Arc<dyn ByteSource>) -> Self {
        Self {
            name: name.into(),
            category,
            support: SupportLevel::Full,
            source,
        }
    }

    pub fn with_support(mut self, support: SupportLevel) -> Self {
        self.support = support;
        self
    }

    pub fn size(&self) -> u64 {
        self.source.len()
    }
}

impl fmt::Debug for FileInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileInput")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("support", &self.support)
            .field("size", &self.size())
            .finish()
    }
}

/// One compression job, owned by the batch scheduler for its lifetime.
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub category: Category,
    pub file_size: u64,
    pub support: SupportLevel,
    pub source: Arc<dyn ByteSource>,
    state: JobState,
    cancel: CancellationToken,
}

impl Job {
    pub fn new(id: JobId, input: FileInput, cancel: CancellationToken) -> Self {
        let file_size = input.size();
        Self {
            id,
            name: input.name,
            category: input.category,
            file_size,
            support: input.support,
            source: input.source,
            state: JobState::Queued,
            cancel,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Moves the job to `next`, ignoring transitions the lifecycle does not allow.
    ///
    /// Returns whether the transition was applied.
    pub fn set_state(&mut self, next: JobState) -> bool {
        if self.state.can_move_to(next) {
            debug!("{} {:?} -> {:?}", self.id, self.state, next);
            self.state = next;
            true
        } else {
            debug!("{} ignoring transition {:?} -> {:?}", self.id, self.state, next);
            false
        }
    }

    /// Whether cancellation was requested for this job (directly or via cancel-all).
    pub fn cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("category", &self.category)
            .field("file_size", &self.file_size)
            .field("state", &self.state)
            .field("cancel_requested", &self.cancel_requested())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::MemorySource;

    fn job() -> Job {
        let input = FileInput::new("a.png", Category::Image, Arc::new(MemorySource::new(vec![0u8; 8])));
        Job::new(JobId(1), input, CancellationToken::new())
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut job = job();
        assert_eq!(job.file_size, 8);
        assert!(job.set_state(JobState::Admitted));
        assert!(job.set_state(JobState::Running));
        assert!(job.set_state(JobState::Completed));
        assert_eq!(job.state(), JobState::Completed);

        assert!(!job.set_state(JobState::Running));
        assert_eq!(job.state(), JobState::Completed);
    }

    #[test]
    fn test_cancelling_precedes_cancelled() {
        let mut job = job();
        job.set_state(JobState::Admitted);
        job.set_state(JobState::Running);
        assert!(!job.set_state(JobState::Cancelled));
        assert_eq!(job.state(), JobState::Running);
        assert!(job.set_state(JobState::Cancelling));
        assert!(job.set_state(JobState::Cancelled));
        assert!(job.state().is_terminal());
    }

    #[test]
    fn test_cancel_flag_follows_token() {
        let job = job();
        assert!(!job.cancel_requested());
        job.cancel_token().cancel();
        assert!(job.cancel_requested());
    }
}
