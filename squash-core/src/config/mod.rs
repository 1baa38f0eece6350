//! Configuration structures and constants for the squash-core library.
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! environment variables, then whatever the caller sets through
//! `SchedulerConfigBuilder`. The exact concurrency numbers are policy, not
//! correctness requirements, so every one of them can be overridden.

mod builder;
mod utils;

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use builder::SchedulerConfigBuilder;
use utils::{get_env_opt_u64, get_env_opt_usize, get_env_u64};

use crate::error::{CoreError, CoreResult};
use crate::fallback::Capability;
use crate::profile::{Category, ProfileOverride, ProfileRegistry};

// Default constants

/// Upper bound on simultaneously running jobs, regardless of host size.
/// Bounds the worst-case simultaneous peak memory.
pub const MAX_GLOBAL_CONCURRENT: usize = 4;

/// How long a job waiting for an admission slot sleeps between checks.
pub const DEFAULT_ADMISSION_POLL_MS: u64 = 100;

/// Environment variable overriding the global concurrency limit.
pub const ENV_GLOBAL_MAX_CONCURRENT: &str = "SQUASH_GLOBAL_MAX_CONCURRENT";

/// Environment variable overriding the admission poll interval, in milliseconds.
pub const ENV_ADMISSION_POLL_MS: &str = "SQUASH_ADMISSION_POLL_MS";

/// Environment variable capping the memory limit, in bytes.
pub const ENV_MEMORY_LIMIT_BYTES: &str = "SQUASH_MEMORY_LIMIT_BYTES";

const GIB: u64 = 1024 * 1024 * 1024;

/// Main configuration structure for the scheduler.
///
/// All fields have defaults; a JSON file only needs to mention what it changes.
///
/// # Examples
///
/// ```rust
/// use squash_core::config::SchedulerConfig;
///
/// let config: SchedulerConfig = serde_json::from_str(
///     r#"{ "global_max_concurrent": 2, "profiles": { "video": { "max_concurrent": 1 } } }"#,
/// ).unwrap();
/// assert_eq!(config.global_max_concurrent, Some(2));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Global limit on running jobs. `None` derives it from the host.
    pub global_max_concurrent: Option<usize>,

    /// Sleep between admission checks while waiting for a slot.
    pub admission_poll_interval_ms: u64,

    /// Caps the memory limit reported by the host oracle.
    pub memory_limit_bytes: Option<u64>,

    /// Fixed capability set. `None` detects the host's capabilities.
    pub capabilities: Option<Vec<Capability>>,

    /// Partial per-category profile overrides.
    pub profiles: BTreeMap<Category, ProfileOverride>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            global_max_concurrent: None,
            admission_poll_interval_ms: DEFAULT_ADMISSION_POLL_MS,
            memory_limit_bytes: None,
            capabilities: None,
            profiles: BTreeMap::new(),
        }
    }
}

impl SchedulerConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Loads a JSON config file and applies environment overrides on top.
    pub fn from_json_file(path: &Path) -> CoreResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config.with_env_overrides())
    }

    /// Applies `SQUASH_*` environment variables on top of this config.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(global) = get_env_opt_usize(ENV_GLOBAL_MAX_CONCURRENT) {
            self.global_max_concurrent = Some(global);
        }
        self.admission_poll_interval_ms =
            get_env_u64(ENV_ADMISSION_POLL_MS, self.admission_poll_interval_ms);
        if let Some(limit) = get_env_opt_u64(ENV_MEMORY_LIMIT_BYTES) {
            self.memory_limit_bytes = Some(limit);
        }
        self
    }

    pub fn admission_poll_interval(&self) -> Duration {
        Duration::from_millis(self.admission_poll_interval_ms)
    }

    /// Builds the profile registry described by this config.
    pub fn profile_registry(&self) -> CoreResult<ProfileRegistry> {
        ProfileRegistry::with_overrides(&self.profiles)
    }

    /// Derives the global concurrency limit.
    ///
    /// Starts from the configured value or the host's hardware threads,
    /// tightens it on small memory limits, and clamps to `1..=MAX_GLOBAL_CONCURRENT`.
    pub fn resolve_global_max(&self, hardware_threads: usize, memory_limit: Option<u64>) -> usize {
        let mut hint = self.global_max_concurrent.unwrap_or(hardware_threads);
        match memory_limit {
            Some(limit) if limit < GIB => hint = hint.min(1),
            Some(limit) if limit < 2 * GIB => hint = hint.min(2),
            _ => {}
        }
        hint.clamp(1, MAX_GLOBAL_CONCURRENT)
    }

    /// Checks the config for values the scheduler cannot work with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.admission_poll_interval_ms == 0 {
            return Err(CoreError::Config(
                "admission_poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.global_max_concurrent == Some(0) {
            return Err(CoreError::Config(
                "global_max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.memory_limit_bytes == Some(0) {
            return Err(CoreError::Config(
                "memory_limit_bytes must be greater than zero".to_string(),
            ));
        }
        self.profile_registry().map(|_| ())
    }
}
