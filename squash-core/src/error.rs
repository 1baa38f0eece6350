//! Error types for the squash-core library.
//!
//! `CoreError` is the single error type surfaced by the scheduler. Lower-level
//! failures (executor errors, I/O while reading chunks) are translated into it
//! at the streaming executor boundary so that callers only ever see the
//! scheduling taxonomy. `JobError` is the serializable, user-facing form
//! attached to a failed `JobResult`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fallback::MethodId;
use crate::profile::Category;

/// How an executor failure should be treated by the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorErrorKind {
    /// The method cannot run in this environment (missing codec, feature not
    /// compiled in, hardware refused). The next method in the chain is tried.
    EnvironmentIncapable,
    /// The input bytes are unusable. No other method will do better.
    DataInvalid,
    /// Any other failure reported by the executor.
    Failed,
}

/// Error returned by a `CompressionExecutor` for a single chunk.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ExecutorError {
    pub kind: ExecutorErrorKind,
    pub message: String,
}

impl ExecutorError {
    pub fn new(kind: ExecutorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn environment_incapable(message: impl Into<String>) -> Self {
        Self::new(ExecutorErrorKind::EnvironmentIncapable, message)
    }

    pub fn data_invalid(message: impl Into<String>) -> Self {
        Self::new(ExecutorErrorKind::DataInvalid, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ExecutorErrorKind::Failed, message)
    }

    /// Whether the fallback chain may advance past this failure.
    #[must_use]
    pub fn is_environment_incapable(&self) -> bool {
        self.kind == ExecutorErrorKind::EnvironmentIncapable
    }
}

impl fmt::Display for ExecutorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnvironmentIncapable => write!(f, "environment incapable"),
            Self::DataInvalid => write!(f, "invalid data"),
            Self::Failed => write!(f, "executor failed"),
        }
    }
}

/// Custom error type for the squash-core library.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The job cannot fit in memory even on its own. Never retried.
    #[error("{category} job needs {required} bytes but only {available} bytes are available")]
    MemoryExhausted {
        category: Category,
        required: u64,
        available: u64,
    },

    /// The job was cancelled before it could finish.
    #[error("job cancelled")]
    Cancelled,

    /// A compression method returned an error.
    #[error("method '{method}' failed: {source}")]
    Executor {
        method: MethodId,
        #[source]
        source: ExecutorError,
    },

    /// Every method in the fallback chain was unusable.
    #[error("all {} compression methods for {category} exhausted{}", .attempted.len(), last_error_suffix(.last))]
    AllMethodsExhausted {
        category: Category,
        attempted: Vec<MethodId>,
        last: Option<ExecutorError>,
    },

    /// The input was flagged unsupported by the format provider.
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("No supported input files found")]
    NoFilesFound,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn last_error_suffix(last: &Option<ExecutorError>) -> String {
    match last {
        Some(err) => format!(" (last error: {err})"),
        None => String::new(),
    }
}

/// Result type for squash-core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Classification shown to users for a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    MemoryExhausted,
    ExecutorFailure,
    DataInvalid,
    AllMethodsExhausted,
    Unsupported,
    Internal,
}

/// User-visible description of a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: JobErrorKind,
    pub message: String,
    pub category: Category,
    /// True when retrying elsewhere (smaller file, other host) might help,
    /// false when the input itself is unusable.
    pub retryable: bool,
}

impl JobError {
    /// Translates a terminal `CoreError` into its user-facing form.
    ///
    /// Returns `None` for `Cancelled`, which is a terminal state of its own
    /// rather than a failure.
    #[must_use]
    pub fn from_core(error: &CoreError, category: Category) -> Option<Self> {
        let (kind, retryable) = match error {
            CoreError::Cancelled => return None,
            CoreError::MemoryExhausted { .. } => (JobErrorKind::MemoryExhausted, true),
            CoreError::Executor { source, .. } => match source.kind {
                ExecutorErrorKind::DataInvalid => (JobErrorKind::DataInvalid, false),
                ExecutorErrorKind::EnvironmentIncapable | ExecutorErrorKind::Failed => {
                    (JobErrorKind::ExecutorFailure, true)
                }
            },
            CoreError::AllMethodsExhausted { .. } => (JobErrorKind::AllMethodsExhausted, true),
            CoreError::UnsupportedInput(_) | CoreError::NoFilesFound => {
                (JobErrorKind::Unsupported, false)
            }
            CoreError::Io(_) | CoreError::Json(_) | CoreError::Config(_) => {
                (JobErrorKind::Internal, true)
            }
        };

        Some(Self {
            kind,
            message: error.to_string(),
            category,
            retryable,
        })
    }

    /// Builds the error recorded when a job task panicked.
    #[must_use]
    pub fn internal(message: impl Into<String>, category: Category) -> Self {
        Self {
            kind: JobErrorKind::Internal,
            message: message.into(),
            category,
            retryable: true,
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hint = if self.retryable {
            "may succeed elsewhere"
        } else {
            "input unusable"
        };
        write!(f, "[{}] {} ({hint})", self.category, self.message)
    }
}
