//! Cancellation Registry: per-job tokens plus a global "cancel all" switch.
//!
//! Every job token is a child of the global token in effect when the job was
//! registered, so cancelling the global token cancels every registered job.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use super::JobId;

#[derive(Debug)]
struct Registry {
    global: CancellationToken,
    jobs: HashMap<JobId, CancellationToken>,
}

#[derive(Debug)]
pub struct CancellationRegistry {
    inner: Mutex<Registry>,
}

impl Default for CancellationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Registry {
                global: CancellationToken::new(),
                jobs: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates the cancellation token for a new job.
    ///
    /// A job registered after `cancel_all` (and before `reset`) starts out
    /// cancelled.
    pub fn register(&self, id: JobId) -> CancellationToken {
        let mut registry = self.lock();
        let token = registry.global.child_token();
        registry.jobs.insert(id, token.clone());
        token
    }

    /// Forgets a job that reached a terminal state.
    pub fn unregister(&self, id: JobId) {
        self.lock().jobs.remove(&id);
    }

    /// Requests cancellation of one job. Returns false for unknown ids.
    pub fn cancel_job(&self, id: JobId) -> bool {
        match self.lock().jobs.get(&id) {
            Some(token) => {
                debug!("Cancellation requested for {id}");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every registered job and trips the global switch. Idempotent.
    pub fn cancel_all(&self) {
        let registry = self.lock();
        if !registry.global.is_cancelled() {
            info!("Cancelling all jobs ({} registered)", registry.jobs.len());
        }
        registry.global.cancel();
    }

    /// Installs a fresh global switch so new work can be accepted.
    ///
    /// Jobs registered earlier keep their cancelled state.
    pub fn reset(&self) {
        let mut registry = self.lock();
        if registry.global.is_cancelled() {
            debug!("Resetting global cancellation switch");
            registry.global = CancellationToken::new();
        }
    }

    /// Current global token.
    pub fn global_token(&self) -> CancellationToken {
        self.lock().global.clone()
    }

    pub fn is_all_cancelled(&self) -> bool {
        self.lock().global.is_cancelled()
    }

    /// Whether cancellation was requested for `id`. Unknown ids report false.
    pub fn is_cancelled(&self, id: JobId) -> bool {
        self.lock()
            .jobs
            .get(&id)
            .is_some_and(CancellationToken::is_cancelled)
    }

    pub fn registered_count(&self) -> usize {
        self.lock().jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_job_only_affects_that_job() {
        let registry = CancellationRegistry::new();
        let a = registry.register(JobId(1));
        let b = registry.register(JobId(2));

        assert!(registry.cancel_job(JobId(1)));
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert!(!registry.is_all_cancelled());
        assert!(!registry.cancel_job(JobId(99)));
    }

    #[test]
    fn test_cancel_all_is_idempotent() {
        let registry = CancellationRegistry::new();
        let a = registry.register(JobId(1));
        registry.cancel_all();
        registry.cancel_all();
        assert!(a.is_cancelled());
        assert!(registry.is_cancelled(JobId(1)));

        let late = registry.register(JobId(2));
        assert!(late.is_cancelled());
    }

    #[test]
    fn test_reset_accepts_new_work() {
        let registry = CancellationRegistry::new();
        let old = registry.register(JobId(1));
        registry.cancel_all();
        registry.reset();

        let fresh = registry.register(JobId(2));
        assert!(old.is_cancelled());
        assert!(!fresh.is_cancelled());
        assert!(!registry.is_all_cancelled());
    }

    #[test]
    fn test_unregister() {
        let registry = CancellationRegistry::new();
        registry.register(JobId(7));
        assert_eq!(registry.registered_count(), 1);
        registry.unregister(JobId(7));
        assert_eq!(registry.registered_count(), 0);
        assert!(!registry.is_cancelled(JobId(7)));
    }
}
