//! Contract for the per-method compression executors.
//!
//! Concrete encoders live outside this crate. The scheduler only sees their
//! success or failure per chunk, and picks which one to call through the
//! fallback chain.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::MethodId;
use crate::error::ExecutorError;
use crate::profile::Category;
use crate::scheduler::JobId;

/// Caller-chosen compression settings passed through to executors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionSettings {
    /// Target quality, 0 (smallest) to 100 (best).
    pub quality: u8,
    /// Keep metadata (EXIF, tags) where the method supports it.
    pub preserve_metadata: bool,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            quality: 80,
            preserve_metadata: false,
        }
    }
}

/// Where a chunk sits within its job.
#[derive(Debug, Clone, Copy)]
pub struct ChunkContext<'a> {
    pub job_id: JobId,
    pub category: Category,
    pub index: usize,
    /// Current estimate of the job's chunk count. May grow if chunks shrink
    /// under memory pressure.
    pub total: usize,
    pub settings: &'a CompressionSettings,
}

/// A compression method.
///
/// Chunks of one job are always passed in index order, one at a time, so
/// implementations may keep cross-chunk state keyed by `ChunkContext::job_id`.
#[async_trait]
pub trait CompressionExecutor: Send + Sync {
    /// Identifier matching an entry of the method table.
    fn method(&self) -> MethodId;

    /// Compresses one chunk.
    async fn process(
        &self,
        chunk: &[u8],
        ctx: &ChunkContext<'_>,
    ) -> Result<Vec<u8>, ExecutorError>;
}

/// Registered executors, keyed by method id.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<MethodId, Arc<dyn CompressionExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an executor under its own method id, replacing any previous one.
    pub fn register(&mut self, executor: Arc<dyn CompressionExecutor>) {
        self.executors.insert(executor.method(), executor);
    }

    /// Builder-style `register`.
    pub fn with(mut self, executor: Arc<dyn CompressionExecutor>) -> Self {
        self.register(executor);
        self
    }

    pub fn get(&self, method: &MethodId) -> Option<Arc<dyn CompressionExecutor>> {
        self.executors.get(method).cloned()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut methods: Vec<&MethodId> = self.executors.keys().collect();
        methods.sort();
        f.debug_struct("ExecutorRegistry")
            .field("methods", &methods)
            .finish()
    }
}
