// ============================================================================
// squash-core/src/config/builder.rs
// ============================================================================
//
// CONFIGURATION BUILDER: Builder Pattern for SchedulerConfig
//
// Provides a fluent API for assembling a SchedulerConfig on top of the
// environment-aware defaults, validating the result on build.

// ---- Standard library imports ----
use std::collections::BTreeMap;

// ---- Internal crate imports ----
use super::SchedulerConfig;
use crate::error::CoreResult;
use crate::fallback::Capability;
use crate::profile::{Category, ProfileOverride};

/// Builder for creating SchedulerConfig instances.
///
/// # Examples
///
/// ```rust
/// use squash_core::config::SchedulerConfigBuilder;
/// use squash_core::profile::{Category, ProfileOverride};
///
/// let config = SchedulerConfigBuilder::new()
///     .global_max_concurrent(2)
///     .admission_poll_interval_ms(25)
///     .profile(Category::Video, ProfileOverride { max_concurrent: Some(1), ..Default::default() })
///     .build()
///     .unwrap();
/// assert_eq!(config.global_max_concurrent, Some(2));
/// ```
#[derive(Debug, Clone)]
pub struct SchedulerConfigBuilder {
    base: SchedulerConfig,
    profiles: BTreeMap<Category, ProfileOverride>,
}

impl Default for SchedulerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerConfigBuilder {
    /// Creates a builder seeded with defaults and environment overrides.
    pub fn new() -> Self {
        Self::from_config(SchedulerConfig::from_env())
    }

    /// Creates a builder seeded with an existing config (e.g. loaded from a file).
    pub fn from_config(config: SchedulerConfig) -> Self {
        let profiles = config.profiles.clone();
        Self {
            base: config,
            profiles,
        }
    }

    /// Sets the global concurrency limit (clamped later to 1..=4).
    pub fn global_max_concurrent(mut self, jobs: usize) -> Self {
        self.base.global_max_concurrent = Some(jobs);
        self
    }

    /// Sets the sleep between admission checks.
    pub fn admission_poll_interval_ms(mut self, millis: u64) -> Self {
        self.base.admission_poll_interval_ms = millis;
        self
    }

    /// Caps the memory limit reported by the host.
    pub fn memory_limit_bytes(mut self, bytes: u64) -> Self {
        self.base.memory_limit_bytes = Some(bytes);
        self
    }

    /// Uses a fixed capability set instead of host detection.
    pub fn capabilities<I>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = Capability>,
    {
        self.base.capabilities = Some(capabilities.into_iter().collect());
        self
    }

    /// Overrides parts of one category's resource profile.
    ///
    /// Fields left as `None` keep their current value, so repeated calls for
    /// the same category merge.
    pub fn profile(mut self, category: Category, profile: ProfileOverride) -> Self {
        let entry = self.profiles.entry(category).or_default();
        entry.memory_multiplier = profile.memory_multiplier.or(entry.memory_multiplier);
        entry.max_concurrent = profile.max_concurrent.or(entry.max_concurrent);
        entry.streaming_threshold = profile.streaming_threshold.or(entry.streaming_threshold);
        entry.chunk_size_multiplier = profile.chunk_size_multiplier.or(entry.chunk_size_multiplier);
        self
    }

    /// Builds and validates the config.
    pub fn build(self) -> CoreResult<SchedulerConfig> {
        let config = SchedulerConfig {
            profiles: self.profiles,
            ..self.base
        };
        config.validate()?;
        Ok(config)
    }
}
