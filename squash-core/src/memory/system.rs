use std::sync::Mutex;

use log::debug;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

use super::{MemoryOracle, MemorySnapshot};

/// Memory oracle backed by the host's memory statistics.
///
/// The effective limit is the smallest of the physical total, the cgroup
/// limit (when the process runs inside one) and an optional configured cap.
pub struct SystemMemoryOracle {
    system: Mutex<System>,
    configured_limit: Option<u64>,
}

impl SystemMemoryOracle {
    pub fn new(configured_limit: Option<u64>) -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new().with_memory(MemoryRefreshKind::everything()),
        );
        Self {
            system: Mutex::new(system),
            configured_limit,
        }
    }
}

impl Default for SystemMemoryOracle {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MemoryOracle for SystemMemoryOracle {
    fn snapshot(&self) -> Option<MemorySnapshot> {
        let mut system = self.system.lock().ok()?;
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            // sysinfo reports zero on platforms it cannot read
            return None;
        }

        let mut limit = total;
        let mut used = total.saturating_sub(system.available_memory());

        if let Some(cgroup) = system.cgroup_limits() {
            if cgroup.total_memory > 0 && cgroup.total_memory < limit {
                limit = cgroup.total_memory;
                used = cgroup.total_memory.saturating_sub(cgroup.free_memory);
            }
        }
        if let Some(cap) = self.configured_limit {
            limit = limit.min(cap);
        }

        let snapshot = MemorySnapshot::new(used, total, limit);
        debug!(
            "Memory snapshot: used {} of {} limit ({:.1}%)",
            snapshot.used_bytes,
            snapshot.limit_bytes,
            snapshot.usage_percentage() * 100.0
        );
        Some(snapshot)
    }
}
