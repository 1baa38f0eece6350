//! Scheduler context: everything a batch needs, built once and shared by `Arc`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::info;

use crate::config::SchedulerConfig;
use crate::error::CoreResult;
use crate::fallback::{
    CapabilityProvider, CapabilitySet, ExecutorRegistry, FallbackResolver, HostCapabilityProvider,
};
use crate::memory::{MemoryMonitor, MemoryOracle, SystemMemoryOracle};
use crate::profile::ProfileRegistry;
use crate::scheduler::{AdmissionController, CancellationRegistry, JobId};
use crate::streaming::StreamingExecutor;
use crate::utils::format_bytes;

/// Shared scheduler state.
///
/// Owns the profile registry, the memory monitor, the Admission Controller
/// (and through it the concurrency ledger), the Cancellation Registry, the
/// capability set computed at construction, the fallback resolver, the
/// executor registry and the job-id counter.
#[derive(Debug)]
pub struct SchedulerContext {
    config: SchedulerConfig,
    profiles: ProfileRegistry,
    memory: Arc<MemoryMonitor>,
    admission: AdmissionController,
    cancellation: CancellationRegistry,
    capabilities: CapabilitySet,
    resolver: FallbackResolver,
    executors: ExecutorRegistry,
    streaming: StreamingExecutor,
    next_id: AtomicU64,
}

impl SchedulerContext {
    /// Builds a context from explicit collaborators.
    ///
    /// A capability list in `config` takes precedence over `capabilities`.
    pub fn new(
        config: SchedulerConfig,
        oracle: Arc<dyn MemoryOracle>,
        capabilities: &dyn CapabilityProvider,
        executors: ExecutorRegistry,
    ) -> CoreResult<Self> {
        config.validate()?;
        let profiles = config.profile_registry()?;
        let memory = Arc::new(MemoryMonitor::new(oracle));

        let snapshot = memory.snapshot();
        let memory_limit = match (snapshot.map(|s| s.limit_bytes), config.memory_limit_bytes) {
            (Some(observed), Some(cap)) => Some(observed.min(cap)),
            (observed, cap) => observed.or(cap),
        };
        let global_max = config.resolve_global_max(num_cpus::get(), memory_limit);
        info!(
            "Global concurrency limit: {global_max} (memory limit: {})",
            memory_limit.map_or_else(|| "unknown".to_string(), format_bytes)
        );

        let capabilities = match &config.capabilities {
            Some(list) => list.iter().copied().collect(),
            None => capabilities.capabilities(),
        };
        HostCapabilityProvider::log_capabilities(&capabilities);

        let admission = AdmissionController::new(
            profiles.clone(),
            Arc::clone(&memory),
            global_max,
            config.admission_poll_interval(),
        );
        let streaming = StreamingExecutor::new(profiles.clone(), Arc::clone(&memory));

        Ok(Self {
            config,
            profiles,
            memory,
            admission,
            cancellation: CancellationRegistry::new(),
            capabilities,
            resolver: FallbackResolver::default(),
            executors,
            streaming,
            next_id: AtomicU64::new(0),
        })
    }

    /// Builds a context probing the host for memory and capabilities.
    pub fn from_config(config: SchedulerConfig, executors: ExecutorRegistry) -> CoreResult<Self> {
        let oracle = Arc::new(SystemMemoryOracle::new(config.memory_limit_bytes));
        Self::new(config, oracle, &HostCapabilityProvider, executors)
    }

    /// Replaces the fallback resolver (custom method tables).
    pub fn with_resolver(mut self, resolver: FallbackResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn next_job_id(&self) -> JobId {
        JobId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    pub fn memory(&self) -> &Arc<MemoryMonitor> {
        &self.memory
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn cancellation(&self) -> &CancellationRegistry {
        &self.cancellation
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn resolver(&self) -> &FallbackResolver {
        &self.resolver
    }

    pub fn executors(&self) -> &ExecutorRegistry {
        &self.executors
    }

    pub fn streaming(&self) -> &StreamingExecutor {
        &self.streaming
    }
}
