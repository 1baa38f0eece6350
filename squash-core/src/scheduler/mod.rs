//! Job model, admission, cancellation and batch dispatch.

mod admission;
mod batch;
mod cancellation;
mod job;

pub use admission::{
    AdmissionController, AdmissionResult, AdmissionSlot, ConcurrencyLedger, ConcurrencyLimits,
    LedgerSnapshot, TryAdmit,
};
pub use batch::{BatchScheduler, JobResult, JobStatus};
pub use cancellation::CancellationRegistry;
pub use job::{FileInput, Job, JobId, JobState, JobWarning, SupportLevel};
