//! Memory Oracle: point-in-time memory snapshots.
//!
//! The scheduler never caches memory readings. Every admission decision and
//! every chunk boundary asks the oracle for a fresh `MemorySnapshot`. Hosts
//! without memory introspection return `None`, which downstream code treats
//! as "assume safe".

mod system;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::warn;
use serde::{Deserialize, Serialize};

pub use system::SystemMemoryOracle;

/// Usage ratio above which memory counts as under high pressure.
pub const HIGH_USAGE_RATIO: f64 = 0.8;

/// Usage ratio above which memory counts as critical.
pub const CRITICAL_USAGE_RATIO: f64 = 0.9;

/// Qualitative memory pressure derived from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPressure {
    Normal,
    High,
    Critical,
}

/// Memory usage as observed at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub used_bytes: u64,
    pub total_bytes: u64,
    /// Effective ceiling for this process. Never above `total_bytes`.
    pub limit_bytes: u64,
}

impl MemorySnapshot {
    pub fn new(used_bytes: u64, total_bytes: u64, limit_bytes: u64) -> Self {
        Self {
            used_bytes,
            total_bytes,
            limit_bytes: limit_bytes.min(total_bytes),
        }
    }

    /// Fraction of the limit currently in use (0.0 to 1.0+).
    pub fn usage_percentage(&self) -> f64 {
        if self.limit_bytes == 0 {
            return 1.0;
        }
        self.used_bytes as f64 / self.limit_bytes as f64
    }

    pub fn available_bytes(&self) -> u64 {
        self.limit_bytes.saturating_sub(self.used_bytes)
    }

    pub fn is_high_usage(&self) -> bool {
        self.usage_percentage() > HIGH_USAGE_RATIO
    }

    pub fn is_critical_usage(&self) -> bool {
        self.usage_percentage() > CRITICAL_USAGE_RATIO
    }

    pub fn pressure(&self) -> MemoryPressure {
        if self.is_critical_usage() {
            MemoryPressure::Critical
        } else if self.is_high_usage() {
            MemoryPressure::High
        } else {
            MemoryPressure::Normal
        }
    }
}

/// Source of memory snapshots.
///
/// Implementations must not block for long and must not panic. `None` means
/// the host offers no memory introspection.
pub trait MemoryOracle: Send + Sync {
    fn snapshot(&self) -> Option<MemorySnapshot>;
}

/// Oracle for hosts without memory introspection.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableMemoryOracle;

impl MemoryOracle for UnavailableMemoryOracle {
    fn snapshot(&self) -> Option<MemorySnapshot> {
        None
    }
}

/// Oracle that always reports the same snapshot.
#[derive(Debug, Clone, Copy)]
pub struct FixedMemoryOracle {
    snapshot: MemorySnapshot,
}

impl FixedMemoryOracle {
    pub fn new(snapshot: MemorySnapshot) -> Self {
        Self { snapshot }
    }

    /// A roomy host: `limit_bytes` of memory with `used_ratio` of it in use.
    pub fn with_usage(limit_bytes: u64, used_ratio: f64) -> Self {
        let used = (limit_bytes as f64 * used_ratio) as u64;
        Self::new(MemorySnapshot::new(used, limit_bytes, limit_bytes))
    }
}

impl MemoryOracle for FixedMemoryOracle {
    fn snapshot(&self) -> Option<MemorySnapshot> {
        Some(self.snapshot)
    }
}

/// Oracle that replays a fixed sequence of snapshots, then keeps repeating the last one.
///
/// Used to drive pressure changes deterministically in simulations and tests.
#[derive(Debug)]
pub struct ScriptedMemoryOracle {
    script: Mutex<VecDeque<Option<MemorySnapshot>>>,
    last: Mutex<Option<MemorySnapshot>>,
}

impl ScriptedMemoryOracle {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Option<MemorySnapshot>>,
    {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(None),
        }
    }
}

impl MemoryOracle for ScriptedMemoryOracle {
    fn snapshot(&self) -> Option<MemorySnapshot> {
        let (Ok(mut script), Ok(mut last)) = (self.script.lock(), self.last.lock()) else {
            return None;
        };
        if let Some(next) = script.pop_front() {
            *last = next;
        }
        *last
    }
}

/// Shared handle to the oracle used by every scheduler component.
///
/// Logs once, the first time the oracle reports that introspection is
/// unavailable.
pub struct MemoryMonitor {
    oracle: Arc<dyn MemoryOracle>,
    unavailable_logged: AtomicBool,
}

impl MemoryMonitor {
    pub fn new(oracle: Arc<dyn MemoryOracle>) -> Self {
        Self {
            oracle,
            unavailable_logged: AtomicBool::new(false),
        }
    }

    /// Fresh snapshot, or `None` when the host cannot tell.
    pub fn snapshot(&self) -> Option<MemorySnapshot> {
        let snapshot = self.oracle.snapshot();
        if snapshot.is_none() && !self.unavailable_logged.swap(true, Ordering::Relaxed) {
            warn!("Memory introspection unavailable; scheduling as if memory were plentiful");
        }
        snapshot
    }
}

impl std::fmt::Debug for MemoryMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMonitor").finish_non_exhaustive()
    }
}
