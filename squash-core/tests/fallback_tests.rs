//! Fallback chain execution through the batch scheduler.

mod common;

use std::sync::{Arc, Mutex};

use common::*;
use squash_core::{
    Capability, CapabilitySet, Category, CompressionSettings, JobErrorKind, JobStatus, JobWarning,
    MethodId,
};

fn image_capabilities() -> CapabilitySet {
    [Capability::Simd, Capability::Threads].into_iter().collect()
}

#[tokio::test]
async fn test_capability_error_advances_to_next_method() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let simd = Arc::new(
        TestExecutor::new("image-simd")
            .behavior(Behavior::EnvironmentIncapable)
            .log_to(Arc::clone(&order)),
    );
    let threaded = Arc::new(TestExecutor::new("image-threaded").log_to(Arc::clone(&order)));
    let baseline = Arc::new(TestExecutor::new("image-baseline").log_to(Arc::clone(&order)));
    let service = service_with(
        config(2),
        roomy_oracle(),
        image_capabilities(),
        &[simd, threaded, Arc::clone(&baseline)],
    );

    let results = service
        .submit_batch(
            vec![input("photo.jpg", Category::Image, MIB)],
            CompressionSettings::default(),
            RecordingSink::new(),
        )
        .await;

    let result = &results[0];
    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(result.method, Some(MethodId::from_static("image-threaded")));
    assert_eq!(*order.lock().unwrap(), vec!["image-simd", "image-threaded"]);
    assert_eq!(baseline.calls(), 0);
    assert!(result.warnings.iter().any(|warning| matches!(
        warning,
        JobWarning::MethodUnavailable { method, .. } if method.as_str() == "image-simd"
    )));
}

#[tokio::test]
async fn test_data_invalid_is_terminal() {
    let simd = Arc::new(TestExecutor::new("image-simd").behavior(Behavior::DataInvalid));
    let threaded = Arc::new(TestExecutor::new("image-threaded"));
    let service = service_with(
        config(2),
        roomy_oracle(),
        image_capabilities(),
        &[simd, Arc::clone(&threaded)],
    );

    let results = service
        .submit_batch(
            vec![input("corrupt.jpg", Category::Image, MIB)],
            CompressionSettings::default(),
            RecordingSink::new(),
        )
        .await;

    let result = &results[0];
    assert_eq!(result.status, JobStatus::Failed);
    let error = result.error.as_ref().unwrap();
    assert_eq!(error.kind, JobErrorKind::DataInvalid);
    assert!(!error.retryable);
    assert_eq!(threaded.calls(), 0);
}

#[tokio::test]
async fn test_generic_failure_is_terminal_but_retryable() {
    let simd = Arc::new(TestExecutor::new("image-simd").behavior(Behavior::Failed));
    let threaded = Arc::new(TestExecutor::new("image-threaded"));
    let service = service_with(
        config(2),
        roomy_oracle(),
        image_capabilities(),
        &[simd, Arc::clone(&threaded)],
    );

    let results = service
        .submit_batch(
            vec![input("photo.jpg", Category::Image, MIB)],
            CompressionSettings::default(),
            RecordingSink::new(),
        )
        .await;

    let error = results[0].error.as_ref().unwrap();
    assert_eq!(error.kind, JobErrorKind::ExecutorFailure);
    assert!(error.retryable);
    assert_eq!(threaded.calls(), 0);
}

#[tokio::test]
async fn test_exhausted_chain_tries_each_method_once() {
    let executors: Vec<_> = ["image-simd", "image-threaded", "image-baseline"]
        .into_iter()
        .map(|method| {
            Arc::new(TestExecutor::new(method).behavior(Behavior::EnvironmentIncapable))
        })
        .collect();
    let service = service_with(config(2), roomy_oracle(), image_capabilities(), &executors);

    let results = service
        .submit_batch(
            vec![input("photo.jpg", Category::Image, MIB)],
            CompressionSettings::default(),
            RecordingSink::new(),
        )
        .await;

    let result = &results[0];
    assert_eq!(result.status, JobStatus::Failed);
    let error = result.error.as_ref().unwrap();
    assert_eq!(error.kind, JobErrorKind::AllMethodsExhausted);
    assert!(error.message.contains("required codec missing"));
    assert!(executors.iter().all(|executor| executor.calls() == 1));
    assert_eq!(result.warnings.len(), 3);
}

#[tokio::test]
async fn test_missing_executor_counts_as_unavailable() {
    // Only the baseline method is registered; the preferred ones are skipped.
    let baseline = Arc::new(TestExecutor::new("image-baseline"));
    let service = service_with(
        config(2),
        roomy_oracle(),
        image_capabilities(),
        &[Arc::clone(&baseline)],
    );

    let results = service
        .submit_batch(
            vec![input("photo.jpg", Category::Image, MIB)],
            CompressionSettings::default(),
            RecordingSink::new(),
        )
        .await;

    assert_eq!(results[0].status, JobStatus::Completed);
    assert_eq!(results[0].method, Some(MethodId::from_static("image-baseline")));
    assert_eq!(results[0].warnings.len(), 2);
    assert_eq!(baseline.calls(), 1);
}

#[tokio::test]
async fn test_restart_on_fallback_keeps_progress_monotonic() {
    // The hardware method reports it cannot run once streaming has started.
    let hardware = Arc::new(
        TestExecutor::new("video-hardware").behavior(Behavior::EnvironmentIncapable),
    );
    let software = Arc::new(TestExecutor::new("video-software"));
    let capabilities: CapabilitySet = [Capability::HardwareVideoCodec].into_iter().collect();
    let service = service_with(
        config(1),
        roomy_oracle(),
        capabilities,
        &[hardware, Arc::clone(&software)],
    );
    let sink = RecordingSink::new();

    let results = service
        .submit_batch(
            vec![input("clip.mov", Category::Video, 120 * MIB)],
            CompressionSettings::default(),
            sink.clone(),
        )
        .await;

    assert_eq!(results[0].status, JobStatus::Completed);
    assert_eq!(results[0].method, Some(MethodId::from_static("video-software")));
    let percents = sink.job_percents(results[0].job_id);
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|pair| pair[0] < pair[1]));
}
