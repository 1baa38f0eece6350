use log::{info, warn};

use super::{CompressionSettings, ExecutorRegistry, FallbackChain, MethodId};
use crate::error::{CoreError, CoreResult, ExecutorError};
use crate::progress::{JobProgress, ProgressEvent};
use crate::scheduler::{Job, JobWarning};
use crate::streaming::{StreamReport, StreamingExecutor};

/// Runs `job` through the methods of `chain`, in order, until one succeeds.
///
/// A method that reports `EnvironmentIncapable` (or has no registered
/// executor) is skipped with a warning. Any other failure ends the walk.
/// Each method is tried at most once. When every method was skipped, the
/// result is `AllMethodsExhausted` carrying the last environment error.
pub async fn execute_with_fallback(
    job: &Job,
    chain: &FallbackChain,
    registry: &ExecutorRegistry,
    streaming: &StreamingExecutor,
    settings: &CompressionSettings,
    progress: &JobProgress,
    warnings: &mut Vec<JobWarning>,
) -> CoreResult<(MethodId, StreamReport)> {
    let mut attempted: Vec<MethodId> = Vec::with_capacity(chain.len());
    let mut last: Option<ExecutorError> = None;

    for method in chain.iter() {
        if attempted.contains(method) {
            continue;
        }
        attempted.push(method.clone());

        let Some(executor) = registry.get(method) else {
            let err = ExecutorError::environment_incapable("no executor registered");
            skip_method(job, method, &err, progress, warnings);
            last = Some(err);
            continue;
        };

        progress.sink().on_event(ProgressEvent::JobStarted {
            job_id: job.id,
            name: job.name.clone(),
            category: job.category,
            method: method.clone(),
        });
        info!("{} ({}) running with '{}'", job.id, job.name, method);

        match streaming
            .run(job, executor.as_ref(), settings, progress, warnings)
            .await
        {
            Ok(report) => return Ok((method.clone(), report)),
            Err(CoreError::Executor { source, .. }) if source.is_environment_incapable() => {
                skip_method(job, method, &source, progress, warnings);
                last = Some(source);
            }
            Err(err) => return Err(err),
        }
    }

    Err(CoreError::AllMethodsExhausted {
        category: job.category,
        attempted,
        last,
    })
}

fn skip_method(
    job: &Job,
    method: &MethodId,
    err: &ExecutorError,
    progress: &JobProgress,
    warnings: &mut Vec<JobWarning>,
) {
    warn!("{} method '{}' unavailable, trying next: {}", job.id, method, err.message);
    let warning = JobWarning::MethodUnavailable {
        method: method.clone(),
        reason: err.message.clone(),
    };
    progress.warn(warning.clone());
    warnings.push(warning);
}
