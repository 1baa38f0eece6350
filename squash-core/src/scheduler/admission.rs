//! Admission Controller and concurrency ledger.
//!
//! The ledger counts running jobs per category and in total. It is only
//! written through `AdmissionController::try_admit` (increment) and the drop
//! of an `AdmissionSlot` (decrement). The lock guarding it is held for the
//! read-modify-write only, never across an await.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::memory::MemoryMonitor;
use crate::profile::{Category, ProfileRegistry};

#[derive(Debug, Default)]
struct LedgerState {
    running: BTreeMap<Category, usize>,
    running_total: usize,
    peak: BTreeMap<Category, usize>,
    peak_total: usize,
    admitted_total: u64,
    released_total: u64,
}

impl LedgerState {
    fn running(&self, category: Category) -> usize {
        self.running.get(&category).copied().unwrap_or(0)
    }
}

/// Point-in-time copy of the ledger, for diagnostics and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub running: BTreeMap<Category, usize>,
    pub running_total: usize,
    /// Highest per-category count ever observed.
    pub peak: BTreeMap<Category, usize>,
    /// Highest total count ever observed.
    pub peak_total: usize,
    pub admitted_total: u64,
    pub released_total: u64,
}

impl LedgerSnapshot {
    pub fn running(&self, category: Category) -> usize {
        self.running.get(&category).copied().unwrap_or(0)
    }

    pub fn peak(&self, category: Category) -> usize {
        self.peak.get(&category).copied().unwrap_or(0)
    }
}

/// Running-job counts per category plus a global count.
#[derive(Debug, Default)]
pub struct ConcurrencyLedger {
    state: Mutex<LedgerState>,
}

impl ConcurrencyLedger {
    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.lock();
        LedgerSnapshot {
            running: state.running.clone(),
            running_total: state.running_total,
            peak: state.peak.clone(),
            peak_total: state.peak_total,
            admitted_total: state.admitted_total,
            released_total: state.released_total,
        }
    }

    pub fn running_total(&self) -> usize {
        self.lock().running_total
    }

    fn release(&self, category: Category) {
        let mut guard = self.lock();
        let state = &mut *guard;
        let running = state.running.entry(category).or_insert(0);
        if *running == 0 || state.running_total == 0 {
            error!("Release of a {category} slot with nothing running; ledger left unchanged");
            return;
        }
        *running -= 1;
        state.running_total -= 1;
        state.released_total += 1;
        debug!(
            "Released {category} slot ({} running, {} total)",
            state.running(category),
            state.running_total
        );
    }
}

/// A reserved concurrency slot.
///
/// Dropping the slot releases it, so the release happens exactly once on
/// every path: success, failure, cancellation or panic unwinding.
#[derive(Debug)]
#[must_use = "dropping the slot releases it immediately"]
pub struct AdmissionSlot {
    ledger: Arc<ConcurrencyLedger>,
    category: Category,
}

impl AdmissionSlot {
    pub fn category(&self) -> Category {
        self.category
    }
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        self.ledger.release(self.category);
    }
}

/// Outcome of a non-blocking admission attempt.
#[derive(Debug)]
pub enum TryAdmit {
    Admitted(AdmissionSlot),
    /// No slot free right now; worth retrying later.
    Saturated,
    /// The job's estimated cost exceeds available memory. Not retried.
    MemoryExhausted { required: u64, available: u64 },
}

/// Outcome of `admit_or_wait`.
#[derive(Debug)]
pub enum AdmissionResult {
    Admitted(AdmissionSlot),
    MemoryExhausted { required: u64, available: u64 },
    Cancelled,
}

/// Configured limits, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyLimits {
    pub global_max: usize,
    pub per_category: BTreeMap<Category, usize>,
}

/// Decides whether jobs may start.
#[derive(Debug)]
pub struct AdmissionController {
    ledger: Arc<ConcurrencyLedger>,
    profiles: ProfileRegistry,
    memory: Arc<MemoryMonitor>,
    global_max: usize,
    poll_interval: Duration,
}

impl AdmissionController {
    pub fn new(
        profiles: ProfileRegistry,
        memory: Arc<MemoryMonitor>,
        global_max: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            ledger: Arc::new(ConcurrencyLedger::default()),
            profiles,
            memory,
            global_max: global_max.max(1),
            poll_interval,
        }
    }

    /// True when both the category and the global count are below their limits.
    pub fn can_admit(&self, category: Category) -> bool {
        let state = self.ledger.lock();
        state.running(category) < self.profiles.get(category).max_concurrent
            && state.running_total < self.global_max
    }

    /// Estimated peak memory of a job.
    pub fn estimate_cost(&self, category: Category, file_size: u64) -> u64 {
        self.profiles.estimate_cost(category, file_size)
    }

    /// Attempts to reserve a slot without waiting.
    ///
    /// Memory is checked first against a fresh snapshot: a job that does not
    /// fit is refused outright. When introspection is unavailable the job is
    /// assumed to fit.
    pub fn try_admit(&self, category: Category, file_size: u64) -> TryAdmit {
        let required = self.estimate_cost(category, file_size);
        if let Some(snapshot) = self.memory.snapshot() {
            let available = snapshot.available_bytes();
            if required > available {
                debug!("Refusing {category} job: needs {required} bytes, {available} available");
                return TryAdmit::MemoryExhausted {
                    required,
                    available,
                };
            }
        }

        let max_for_category = self.profiles.get(category).max_concurrent;
        let mut state = self.ledger.lock();
        if state.running(category) >= max_for_category || state.running_total >= self.global_max {
            return TryAdmit::Saturated;
        }

        let running = {
            let running = state.running.entry(category).or_insert(0);
            *running += 1;
            *running
        };
        state.running_total += 1;
        state.admitted_total += 1;
        let peak = state.peak.entry(category).or_insert(0);
        *peak = (*peak).max(running);
        state.peak_total = state.peak_total.max(state.running_total);
        debug!(
            "Admitted {category} job ({running}/{max_for_category} in category, {}/{} total)",
            state.running_total, self.global_max
        );
        drop(state);

        TryAdmit::Admitted(AdmissionSlot {
            ledger: Arc::clone(&self.ledger),
            category,
        })
    }

    /// Reserves a slot, cooperatively waiting while the limits are saturated.
    ///
    /// Waits by sleeping for the poll interval between attempts, and returns
    /// `Cancelled` as soon as `cancel` fires.
    pub async fn admit_or_wait(
        &self,
        category: Category,
        file_size: u64,
        cancel: &CancellationToken,
    ) -> AdmissionResult {
        loop {
            if cancel.is_cancelled() {
                return AdmissionResult::Cancelled;
            }
            match self.try_admit(category, file_size) {
                TryAdmit::Admitted(slot) => return AdmissionResult::Admitted(slot),
                TryAdmit::MemoryExhausted {
                    required,
                    available,
                } => {
                    return AdmissionResult::MemoryExhausted {
                        required,
                        available,
                    };
                }
                TryAdmit::Saturated => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => return AdmissionResult::Cancelled,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    pub fn active_job_count(&self) -> usize {
        self.ledger.running_total()
    }

    pub fn ledger(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    pub fn global_max(&self) -> usize {
        self.global_max
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn limits(&self) -> ConcurrencyLimits {
        ConcurrencyLimits {
            global_max: self.global_max,
            per_category: self
                .profiles
                .iter()
                .map(|(category, profile)| (category, profile.max_concurrent))
                .collect(),
        }
    }
}
