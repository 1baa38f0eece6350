//! Streaming execution: chunk planning, progress and mid-stream events.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use squash_core::memory::{MemorySnapshot, ScriptedMemoryOracle, UnavailableMemoryOracle};
use squash_core::streaming::{CRITICAL_CHUNK_CAP, DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE, chunk_count};
use squash_core::{
    CapabilitySet, Category, CompressionSettings, JobId, JobState, JobStatus, JobWarning,
    MemoryPressure,
};

#[tokio::test]
async fn test_large_document_streams_with_monotonic_progress() {
    let document = Arc::new(TestExecutor::new("document-optimize"));
    let service = service_with(
        config(2),
        roomy_oracle(),
        CapabilitySet::new(),
        &[Arc::clone(&document)],
    );
    let size = 200 * MIB;
    let sink = RecordingSink::new();

    let results = service
        .submit_batch(
            vec![input("archive-scan.pdf", Category::Document, size)],
            CompressionSettings::default(),
            sink.clone(),
        )
        .await;

    let result = &results[0];
    assert_eq!(result.status, JobStatus::Completed);
    let expected_chunks = chunk_count(size, DEFAULT_CHUNK_SIZE);
    assert_eq!(expected_chunks, 100);
    assert_eq!(result.chunks, expected_chunks);
    assert_eq!(result.chunk_size, DEFAULT_CHUNK_SIZE);
    assert_eq!(result.output_size, 16 * expected_chunks as u64);
    assert!(document.chunk_lens().iter().all(|&len| len as u64 == DEFAULT_CHUNK_SIZE));

    let percents = sink.job_percents(JobId(1));
    assert_eq!(percents.first(), Some(&0));
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn test_small_input_is_one_chunk() {
    let image = Arc::new(TestExecutor::new("image-baseline"));
    let service = service_with(
        config(2),
        roomy_oracle(),
        CapabilitySet::new(),
        &[Arc::clone(&image)],
    );
    let sink = RecordingSink::new();

    let results = service
        .submit_batch(
            vec![input("icon.png", Category::Image, 3 * MIB)],
            CompressionSettings::default(),
            sink.clone(),
        )
        .await;

    assert_eq!(results[0].chunks, 1);
    assert_eq!(results[0].chunk_size, 3 * MIB);
    assert_eq!(image.chunk_lens(), vec![(3 * MIB) as usize]);
    assert_eq!(sink.job_percents(JobId(1)), vec![0, 100]);
}

#[tokio::test]
async fn test_critical_pressure_shrinks_next_chunk() {
    let normal = MemorySnapshot::new(4 * GIB, 64 * GIB, 64 * GIB);
    let critical = MemorySnapshot::new(60 * GIB, 64 * GIB, 64 * GIB);
    assert!(critical.is_critical_usage());

    // Context setup, admission, the streaming entry and the first two chunk
    // boundaries see normal usage; every later query sees critical usage.
    let oracle = ScriptedMemoryOracle::new(
        std::iter::repeat_n(Some(normal), 5).chain(std::iter::once(Some(critical))),
    );
    let document = Arc::new(TestExecutor::new("document-optimize"));
    let service = service_with(
        config(1),
        Arc::new(oracle),
        CapabilitySet::new(),
        &[Arc::clone(&document)],
    );

    let size = 60 * MIB;
    let results = service
        .submit_batch(
            vec![input("ledger.pdf", Category::Document, size)],
            CompressionSettings::default(),
            RecordingSink::new(),
        )
        .await;
    let result = &results[0];
    assert_eq!(result.status, JobStatus::Completed);

    let lens: Vec<u64> = document.chunk_lens().into_iter().map(|len| len as u64).collect();
    assert_eq!(&lens[..2], &[DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_SIZE]);
    assert!(lens[2..].iter().all(|&len| len == CRITICAL_CHUNK_CAP));
    assert!(lens.iter().all(|&len| len >= MIN_CHUNK_SIZE));
    assert_eq!(lens.iter().sum::<u64>(), size);
    assert_eq!(result.chunks, 2 + chunk_count(size - 2 * DEFAULT_CHUNK_SIZE, CRITICAL_CHUNK_CAP));
    assert_eq!(result.chunk_size, CRITICAL_CHUNK_CAP);

    assert!(result.warnings.contains(&JobWarning::HighMemoryPressure {
        pressure: MemoryPressure::Critical,
        chunk_size: CRITICAL_CHUNK_CAP,
    }));
}

#[tokio::test]
async fn test_unavailable_oracle_plans_as_normal() {
    let document = Arc::new(TestExecutor::new("document-optimize"));
    let service = service_with(
        config(1),
        Arc::new(UnavailableMemoryOracle),
        CapabilitySet::new(),
        &[Arc::clone(&document)],
    );
    assert!(service.memory_snapshot().is_none());

    let results = service
        .submit_batch(
            vec![input("big.pdf", Category::Document, 30 * MIB)],
            CompressionSettings::default(),
            RecordingSink::new(),
        )
        .await;

    assert_eq!(results[0].status, JobStatus::Completed);
    assert_eq!(results[0].chunks, 15);
    assert!(results[0].warnings.is_empty());
}

#[tokio::test]
async fn test_cancel_mid_stream_releases_slot() {
    let document = Arc::new(
        TestExecutor::new("document-optimize").delay(Duration::from_millis(5)),
    );
    let service = service_with(
        config(1),
        roomy_oracle(),
        CapabilitySet::new(),
        &[Arc::clone(&document)],
    );
    let sink = RecordingSink::new();

    let batch = {
        let service = service.clone();
        let sink = sink.clone();
        tokio::spawn(async move {
            service
                .submit_batch(
                    vec![input("long.pdf", Category::Document, 100 * MIB)],
                    CompressionSettings::default(),
                    sink,
                )
                .await
        })
    };

    while document.calls() < 3 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(service.active_job_count(), 1);
    service.cancel_all();

    let results = batch.await.unwrap();
    assert_eq!(results[0].status, JobStatus::Cancelled);
    assert!(results[0].output.is_empty());
    // Stops at the next chunk boundary, not after the remaining chunks.
    assert!(document.calls() < chunk_count(100 * MIB, DEFAULT_CHUNK_SIZE));

    assert_eq!(service.active_job_count(), 0);
    let ledger = service.context().admission().ledger();
    assert_eq!(ledger.admitted_total, 1);
    assert_eq!(ledger.released_total, 1);

    let percents = sink.job_percents(JobId(1));
    assert!(percents.last().is_some_and(|&last| last < 100));
    assert_eq!(
        sink.states(JobId(1)),
        vec![
            JobState::Admitted,
            JobState::Running,
            JobState::Cancelling,
            JobState::Cancelled,
        ]
    );
}
