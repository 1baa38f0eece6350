use std::sync::Arc;

use log::{debug, info, warn};

use super::planner::{chunk_count, recommend_chunk_size};
use crate::error::{CoreError, CoreResult};
use crate::fallback::{ChunkContext, CompressionExecutor, CompressionSettings};
use crate::memory::{MemoryMonitor, MemoryPressure};
use crate::profile::ProfileRegistry;
use crate::progress::{JobProgress, percent_of};
use crate::scheduler::{Job, JobWarning};

/// Result of processing one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub index: usize,
    pub input_len: usize,
    pub output: Vec<u8>,
}

/// Ordered chunk outcomes of a completed run.
#[derive(Debug, Clone, Default)]
pub struct StreamReport {
    pub chunks: Vec<ChunkOutcome>,
    /// False when the input was small enough to go through as one chunk.
    pub streamed: bool,
    /// Chunk size in effect when the run finished.
    pub final_chunk_size: u64,
}

impl StreamReport {
    pub fn output_len(&self) -> u64 {
        self.chunks.iter().map(|chunk| chunk.output.len() as u64).sum()
    }

    /// Concatenates chunk outputs in index order.
    pub fn into_output(self) -> Vec<u8> {
        let mut output = Vec::with_capacity(self.output_len() as usize);
        for chunk in self.chunks {
            output.extend_from_slice(&chunk.output);
        }
        output
    }
}

/// Drives one job through an executor, chunk by chunk.
#[derive(Debug, Clone)]
pub struct StreamingExecutor {
    profiles: ProfileRegistry,
    memory: Arc<MemoryMonitor>,
}

impl StreamingExecutor {
    pub fn new(profiles: ProfileRegistry, memory: Arc<MemoryMonitor>) -> Self {
        Self { profiles, memory }
    }

    /// Runs `job` through `executor`.
    ///
    /// Returns `CoreError::Cancelled` if cancellation is observed at a
    /// checkpoint; chunks processed so far are discarded. Executor errors are
    /// fatal to the run and come back as `CoreError::Executor`.
    pub async fn run(
        &self,
        job: &Job,
        executor: &dyn CompressionExecutor,
        settings: &CompressionSettings,
        progress: &JobProgress,
        warnings: &mut Vec<JobWarning>,
    ) -> CoreResult<StreamReport> {
        let profile = self.profiles.get(job.category);
        let size = job.file_size;

        if job.cancel_requested() {
            return Err(CoreError::Cancelled);
        }
        progress.report(0);

        if size <= profile.streaming_threshold {
            return self.run_whole(job, executor, settings, progress).await;
        }

        let initial = self.memory.snapshot();
        let mut chunk_size = recommend_chunk_size(size, &profile, initial.as_ref());
        let mut chunks = Vec::with_capacity(chunk_count(size, chunk_size));
        let mut offset = 0u64;
        let mut index = 0usize;

        info!(
            "{} streaming {} bytes via '{}' in {}-byte chunks",
            job.id,
            size,
            executor.method(),
            chunk_size
        );

        while offset < size {
            if job.cancel_requested() {
                debug!("{} cancelled before chunk {}", job.id, index);
                return Err(CoreError::Cancelled);
            }

            let snapshot = self.memory.snapshot();
            let planned = recommend_chunk_size(size, &profile, snapshot.as_ref());
            if planned < chunk_size {
                chunk_size = planned;
                let pressure = snapshot
                    .map(|snapshot| snapshot.pressure())
                    .unwrap_or(MemoryPressure::Normal);
                warn!(
                    "{} {:?} memory pressure, chunk size reduced to {} bytes",
                    job.id, pressure, chunk_size
                );
                let warning = JobWarning::HighMemoryPressure {
                    pressure,
                    chunk_size,
                };
                progress.warn(warning.clone());
                warnings.push(warning);
            }

            let remaining = size - offset;
            let len = chunk_size.min(remaining);

            if let Some(snapshot) = snapshot.filter(|snapshot| snapshot.is_critical_usage()) {
                let required = profile.estimate_cost(len);
                if required > snapshot.available_bytes() {
                    return Err(CoreError::MemoryExhausted {
                        category: job.category,
                        required,
                        available: snapshot.available_bytes(),
                    });
                }
            }

            let total = index + chunk_count(remaining, chunk_size);
            let slice = job.source.read_at(offset, to_usize(len)?).await?;
            let ctx = ChunkContext {
                job_id: job.id,
                category: job.category,
                index,
                total,
                settings,
            };
            let output = executor
                .process(&slice, &ctx)
                .await
                .map_err(|source| CoreError::Executor {
                    method: executor.method(),
                    source,
                })?;
            let input_len = slice.len();
            drop(slice);

            debug!(
                "{} chunk {}/{} done ({} -> {} bytes)",
                job.id,
                index + 1,
                total,
                input_len,
                output.len()
            );
            chunks.push(ChunkOutcome {
                index,
                input_len,
                output,
            });

            offset += len;
            index += 1;
            progress.report(percent_of(offset, size));

            tokio::task::yield_now().await;
        }

        Ok(StreamReport {
            chunks,
            streamed: true,
            final_chunk_size: chunk_size,
        })
    }

    async fn run_whole(
        &self,
        job: &Job,
        executor: &dyn CompressionExecutor,
        settings: &CompressionSettings,
        progress: &JobProgress,
    ) -> CoreResult<StreamReport> {
        let data = job.source.read_at(0, to_usize(job.file_size)?).await?;
        let ctx = ChunkContext {
            job_id: job.id,
            category: job.category,
            index: 0,
            total: 1,
            settings,
        };
        let output = executor
            .process(&data, &ctx)
            .await
            .map_err(|source| CoreError::Executor {
                method: executor.method(),
                source,
            })?;
        progress.report(100);

        Ok(StreamReport {
            chunks: vec![ChunkOutcome {
                index: 0,
                input_len: data.len(),
                output,
            }],
            streamed: false,
            final_chunk_size: job.file_size,
        })
    }
}

fn to_usize(len: u64) -> CoreResult<usize> {
    usize::try_from(len).map_err(|_| {
        CoreError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{len} bytes do not fit in memory on this platform"),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutorError;
    use crate::fallback::MethodId;
    use crate::memory::{FixedMemoryOracle, MemoryOracle, UnavailableMemoryOracle};
    use crate::profile::Category;
    use crate::progress::NullProgressSink;
    use crate::scheduler::{FileInput, JobId};
    use crate::streaming::{MIN_CHUNK_SIZE, MemorySource};
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * MIB;

    struct Upper;

    #[async_trait]
    impl CompressionExecutor for Upper {
        fn method(&self) -> MethodId {
            MethodId::from_static("upper")
        }

        async fn process(
            &self,
            chunk: &[u8],
            _ctx: &ChunkContext<'_>,
        ) -> Result<Vec<u8>, ExecutorError> {
            Ok(chunk.to_ascii_uppercase())
        }
    }

    fn executor_with(oracle: Arc<dyn MemoryOracle>) -> StreamingExecutor {
        StreamingExecutor::new(ProfileRegistry::default(), Arc::new(MemoryMonitor::new(oracle)))
    }

    fn job(category: Category, data: Vec<u8>) -> Job {
        let input = FileInput::new("input", category, Arc::new(MemorySource::new(data)));
        Job::new(JobId(1), input, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_small_input_single_chunk() {
        let streaming = executor_with(Arc::new(UnavailableMemoryOracle));
        let job = job(Category::Document, b"hello".to_vec());
        let progress = JobProgress::new(job.id, Arc::new(NullProgressSink));
        let mut warnings = Vec::new();

        let report = streaming
            .run(&job, &Upper, &CompressionSettings::default(), &progress, &mut warnings)
            .await
            .unwrap();

        assert!(!report.streamed);
        assert_eq!(report.chunks.len(), 1);
        assert_eq!(report.into_output(), b"HELLO".to_vec());
        assert_eq!(progress.last_reported(), Some(100));
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let streaming = executor_with(Arc::new(UnavailableMemoryOracle));
        let job = job(Category::Document, b"hello".to_vec());
        job.cancel_token().cancel();
        let progress = JobProgress::new(job.id, Arc::new(NullProgressSink));

        let result = streaming
            .run(&job, &Upper, &CompressionSettings::default(), &progress, &mut Vec::new())
            .await;
        assert!(matches!(result, Err(CoreError::Cancelled)));
        assert_eq!(progress.last_reported(), None);
    }

    #[tokio::test]
    async fn test_critical_pressure_without_room_fails_fast() {
        // 256 KiB free at critical usage; a 512 KiB document chunk needs ~614 KiB.
        let oracle = FixedMemoryOracle::new(crate::memory::MemorySnapshot::new(
            GIB - 256 * 1024,
            GIB,
            GIB,
        ));
        let streaming = executor_with(Arc::new(oracle));
        let job = job(Category::Document, vec![b'a'; (21 * MIB) as usize]);
        let progress = JobProgress::new(job.id, Arc::new(NullProgressSink));

        let result = streaming
            .run(&job, &Upper, &CompressionSettings::default(), &progress, &mut Vec::new())
            .await;
        match result {
            Err(CoreError::MemoryExhausted {
                required,
                available,
                ..
            }) => {
                assert_eq!(available, 256 * 1024);
                assert!(required > available);
                assert!(required >= MIN_CHUNK_SIZE);
            }
            other => panic!("expected MemoryExhausted, got {other:?}"),
        }
    }
}
