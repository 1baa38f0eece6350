//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use squash_core::context::SchedulerContext;
use squash_core::fallback::StaticCapabilityProvider;
use squash_core::memory::{FixedMemoryOracle, MemoryOracle};
use squash_core::streaming::ByteSource;
use squash_core::{
    CapabilitySet, Category, ChunkContext, CompressionExecutor, CompressionService,
    ExecutorError, ExecutorRegistry, FileInput, JobId, JobState, MethodId, ProgressEvent,
    ProgressSink, SchedulerConfig,
};

pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * MIB;

/// Source that synthesizes its bytes on demand, so large inputs cost no memory
/// until a chunk is read.
pub struct PatternSource {
    len: u64,
}

impl PatternSource {
    pub fn new(len: u64) -> Self {
        Self { len }
    }
}

#[async_trait]
impl ByteSource for PatternSource {
    fn len(&self) -> u64 {
        self.len
    }

    async fn read_at(&self, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
        Ok(vec![(offset % 251) as u8; len])
    }
}

pub fn input(name: &str, category: Category, len: u64) -> FileInput {
    FileInput::new(name, category, Arc::new(PatternSource::new(len)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    EnvironmentIncapable,
    DataInvalid,
    Failed,
    Panic,
}

/// Executor with scripted behavior that records what it was asked to do.
pub struct TestExecutor {
    method: MethodId,
    behavior: Behavior,
    delay: Duration,
    calls: AtomicUsize,
    chunk_lens: Mutex<Vec<usize>>,
    order: Option<Arc<Mutex<Vec<String>>>>,
}

impl TestExecutor {
    pub fn new(method: &'static str) -> Self {
        Self {
            method: MethodId::from_static(method),
            behavior: Behavior::Succeed,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            chunk_lens: Mutex::new(Vec::new()),
            order: None,
        }
    }

    pub fn behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Appends the method id to `order` on every call.
    pub fn log_to(mut self, order: Arc<Mutex<Vec<String>>>) -> Self {
        self.order = Some(order);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn chunk_lens(&self) -> Vec<usize> {
        self.chunk_lens.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompressionExecutor for TestExecutor {
    fn method(&self) -> MethodId {
        self.method.clone()
    }

    async fn process(
        &self,
        chunk: &[u8],
        _ctx: &ChunkContext<'_>,
    ) -> Result<Vec<u8>, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.chunk_lens.lock().unwrap().push(chunk.len());
        if let Some(order) = &self.order {
            order.lock().unwrap().push(self.method.to_string());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.behavior {
            Behavior::Succeed => Ok(chunk[..chunk.len().min(16)].to_vec()),
            Behavior::EnvironmentIncapable => Err(ExecutorError::environment_incapable(
                "required codec missing",
            )),
            Behavior::DataInvalid => Err(ExecutorError::data_invalid("corrupt header")),
            Behavior::Failed => Err(ExecutorError::failed("encoder crashed")),
            Behavior::Panic => panic!("executor bug"),
        }
    }
}

/// Records every event it receives.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn job_percents(&self, job_id: JobId) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::JobProgress { job_id: id, percent } if id == job_id => {
                    Some(percent)
                }
                _ => None,
            })
            .collect()
    }

    /// Lifecycle states reported for one job, in order.
    pub fn states(&self, job_id: JobId) -> Vec<JobState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::StateChanged { job_id: id, state } if id == job_id => Some(state),
                _ => None,
            })
            .collect()
    }

    /// Position of the job's `JobFinished` event among all events.
    pub fn finished_at(&self, job_id: JobId) -> Option<usize> {
        self.events().iter().position(|event| {
            matches!(event, ProgressEvent::JobFinished { job_id: id, .. } if *id == job_id)
        })
    }

    pub fn batch_percents(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::BatchProgress { percent, .. } => Some(percent),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn on_event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// 64 GiB host with 10% in use.
pub fn roomy_oracle() -> Arc<dyn MemoryOracle> {
    Arc::new(FixedMemoryOracle::with_usage(64 * GIB, 0.1))
}

/// Fast-polling config with a fixed global limit.
pub fn config(global_max: usize) -> SchedulerConfig {
    SchedulerConfig {
        global_max_concurrent: Some(global_max),
        admission_poll_interval_ms: 5,
        ..SchedulerConfig::default()
    }
}

pub fn service_with(
    config: SchedulerConfig,
    oracle: Arc<dyn MemoryOracle>,
    capabilities: CapabilitySet,
    executors: &[Arc<TestExecutor>],
) -> CompressionService {
    let mut registry = ExecutorRegistry::new();
    for executor in executors {
        registry.register(Arc::clone(executor) as Arc<dyn CompressionExecutor>);
    }
    let provider = StaticCapabilityProvider(capabilities);
    let ctx = SchedulerContext::new(config, oracle, &provider, registry)
        .expect("valid scheduler config");
    CompressionService::new(ctx)
}

/// The last-resort method of every category, which needs no capabilities.
pub fn baseline_executors(delay: Duration) -> Vec<Arc<TestExecutor>> {
    [
        "image-baseline",
        "video-software",
        "audio-software",
        "document-optimize",
        "archive-deflate",
    ]
    .into_iter()
    .map(|method| Arc::new(TestExecutor::new(method).delay(delay)))
    .collect()
}
