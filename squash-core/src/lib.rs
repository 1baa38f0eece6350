//! Core library for resource-aware file compression scheduling.
//!
//! This crate estimates the memory each compression job needs, admits jobs
//! against global and per-category concurrency limits, streams large inputs
//! in pressure-adaptive chunks, walks fallback chains of compression methods
//! and supports cooperative cancellation. The compression methods themselves
//! are supplied by the caller through the `CompressionExecutor` trait.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use squash_core::{
//!     CompressionService, CompressionSettings, ExecutorRegistry, SchedulerConfig,
//!     discover_inputs, logging::LogProgressSink,
//! };
//!
//! # async fn run() -> squash_core::CoreResult<()> {
//! let config = SchedulerConfig::from_env();
//! config.validate()?;
//!
//! // Register one executor per method id, e.g. "image-baseline".
//! let executors = ExecutorRegistry::new();
//! let service = CompressionService::from_config(config, executors)?;
//!
//! let inputs = discover_inputs(&[PathBuf::from("/path/to/files")]).await?;
//! let results = service
//!     .submit_batch(inputs, CompressionSettings::default(), Arc::new(LogProgressSink::new()))
//!     .await;
//! println!("{}", squash_core::BatchSummary::from_results(&results));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod fallback;
pub mod logging;
pub mod memory;
pub mod profile;
pub mod progress;
pub mod report;
pub mod scheduler;
pub mod service;
pub mod streaming;
pub mod utils;

// Re-exports for public API
pub use config::{SchedulerConfig, SchedulerConfigBuilder};
pub use context::SchedulerContext;
pub use discovery::{discover_inputs, find_processable_files};
pub use error::{CoreError, CoreResult, ExecutorError, ExecutorErrorKind, JobError, JobErrorKind};
pub use fallback::{
    Capability, CapabilitySet, ChunkContext, CompressionExecutor, CompressionSettings,
    ExecutorRegistry, FallbackChain, FallbackResolver, MethodId,
};
pub use memory::{MemoryOracle, MemoryPressure, MemorySnapshot};
pub use profile::{Category, ProfileRegistry, ResourceProfile};
pub use progress::{ProgressEvent, ProgressSink};
pub use report::BatchSummary;
pub use scheduler::{FileInput, JobId, JobResult, JobState, JobStatus, JobWarning, SupportLevel};
pub use service::CompressionService;
pub use utils::{format_bytes, format_duration};
