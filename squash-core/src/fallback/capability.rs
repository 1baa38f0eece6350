//! Environment capability detection.
//!
//! The set of capabilities is computed once when the scheduler context is
//! built and never re-probed afterwards. Methods whose requirements are not
//! met are filtered out of the fallback chain up front; methods that turn out
//! to be unusable anyway report `EnvironmentIncapable` at call time.

use std::collections::BTreeSet;
use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A feature of the execution environment that some methods depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// A hardware video encoder is present.
    #[serde(rename = "hasHardwareCodec")]
    HardwareVideoCodec,
    /// Memory can be shared between worker threads.
    #[serde(rename = "hasSharedArrayBuffer")]
    SharedMemory,
    /// SIMD instructions are available to codecs.
    #[serde(rename = "hasSimd")]
    Simd,
    /// More than one worker thread can run at a time.
    #[serde(rename = "hasWorkers")]
    Threads,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::HardwareVideoCodec,
        Capability::SharedMemory,
        Capability::Simd,
        Capability::Threads,
    ];

    /// The flag name used by capability providers and config files.
    pub fn flag(&self) -> &'static str {
        match self {
            Self::HardwareVideoCodec => "hasHardwareCodec",
            Self::SharedMemory => "hasSharedArrayBuffer",
            Self::Simd => "hasSimd",
            Self::Threads => "hasWorkers",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag())
    }
}

impl FromStr for Capability {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|capability| capability.flag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::Config(format!("unknown capability '{s}'")))
    }
}

/// Set of capabilities present in the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// True when every capability in `required` is present.
    pub fn satisfies(&self, required: &[Capability]) -> bool {
        required.iter().all(|capability| self.contains(*capability))
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0.insert(capability);
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("none");
        }
        let flags: Vec<&str> = self.iter().map(|capability| capability.flag()).collect();
        f.write_str(&flags.join(", "))
    }
}

/// Supplies the environment's capability set.
pub trait CapabilityProvider: Send + Sync {
    fn capabilities(&self) -> CapabilitySet;
}

/// Provider returning a fixed, caller-chosen set.
#[derive(Debug, Clone, Default)]
pub struct StaticCapabilityProvider(pub CapabilitySet);

impl CapabilityProvider for StaticCapabilityProvider {
    fn capabilities(&self) -> CapabilitySet {
        self.0.clone()
    }
}

/// Provider probing the current host.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostCapabilityProvider;

impl HostCapabilityProvider {
    /// Detects capabilities for the current platform.
    ///
    /// Hardware video encoding is only assumed on macOS (VideoToolbox).
    pub fn detect() -> CapabilitySet {
        let mut set = CapabilitySet::new();

        if env::consts::OS == "macos" {
            set.insert(Capability::HardwareVideoCodec);
        }
        if cfg!(any(target_feature = "sse2", target_feature = "neon")) {
            set.insert(Capability::Simd);
        }
        if num_cpus::get() > 1 {
            set.insert(Capability::Threads);
            set.insert(Capability::SharedMemory);
        }

        set
    }

    /// Logs the detected capabilities at info level.
    pub fn log_capabilities(set: &CapabilitySet) {
        log::info!("Environment capabilities: {set}");
    }
}

impl CapabilityProvider for HostCapabilityProvider {
    fn capabilities(&self) -> CapabilitySet {
        Self::detect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satisfies_requires_all() {
        let set: CapabilitySet = [Capability::Threads].into_iter().collect();
        assert!(set.satisfies(&[]));
        assert!(set.satisfies(&[Capability::Threads]));
        assert!(!set.satisfies(&[Capability::Threads, Capability::SharedMemory]));
    }

    #[test]
    fn test_flags_round_trip_through_serde_names() {
        let parsed: Vec<Capability> =
            serde_json::from_str(r#"["hasHardwareCodec", "hasWorkers"]"#).unwrap();
        assert_eq!(parsed, vec![Capability::HardwareVideoCodec, Capability::Threads]);
        assert_eq!("hassimd".parse::<Capability>().unwrap(), Capability::Simd);
        assert!("hasQuantum".parse::<Capability>().is_err());
    }

    #[test]
    fn test_display_lists_flags() {
        let set: CapabilitySet = [Capability::Simd, Capability::HardwareVideoCodec]
            .into_iter()
            .collect();
        assert_eq!(set.to_string(), "hasHardwareCodec, hasSimd");
        assert_eq!(CapabilitySet::new().to_string(), "none");
    }
}
