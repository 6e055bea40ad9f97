//! Per-repository worker health, as reported by the supervisor.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use runs::{RepositoryName, Timestamp};
use serde::Serialize;

/// Outcome of one polling cycle for one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Listing calls attempted (one per status, plus the completed-run fetch).
    pub fetches: usize,
    /// Listing calls that failed.
    pub failures: usize,
    /// Snapshots fed to the tracker.
    pub observed: usize,
    /// Message of the last failure in this cycle.
    pub last_error: Option<String>,
}

impl CycleReport {
    /// A cycle fails only when it attempted fetches and none succeeded.
    pub fn is_failed(&self) -> bool {
        self.fetches > 0 && self.failures == self.fetches
    }
}

/// Health record for one repository's polling loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepositoryHealth {
    pub running: bool,
    pub cycles: u64,
    pub last_cycle_started: Option<Timestamp>,
    pub last_cycle_finished: Option<Timestamp>,
    pub consecutive_failed_cycles: u32,
    pub last_error: Option<String>,
}

/// Shared, cloneable view of every repository's health.
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    inner: Arc<RwLock<BTreeMap<RepositoryName, RepositoryHealth>>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, repository: &RepositoryName, f: impl FnOnce(&mut RepositoryHealth)) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(inner.entry(repository.clone()).or_default());
    }

    pub fn worker_started(&self, repository: &RepositoryName) {
        self.update(repository, |health| health.running = true);
    }

    pub fn worker_stopped(&self, repository: &RepositoryName) {
        self.update(repository, |health| health.running = false);
    }

    pub fn cycle_started(&self, repository: &RepositoryName) {
        self.update(repository, |health| {
            health.last_cycle_started = Some(Timestamp::now());
        });
    }

    pub fn cycle_finished(&self, repository: &RepositoryName, report: &CycleReport) {
        self.update(repository, |health| {
            health.cycles += 1;
            health.last_cycle_finished = Some(Timestamp::now());
            if report.is_failed() {
                health.consecutive_failed_cycles += 1;
            } else {
                health.consecutive_failed_cycles = 0;
            }
            if report.last_error.is_some() {
                health.last_error.clone_from(&report.last_error);
            }
        });
    }

    pub fn get(&self, repository: &RepositoryName) -> Option<RepositoryHealth> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(repository)
            .cloned()
    }

    /// Copy of every record, ordered by repository name.
    pub fn snapshot(&self) -> BTreeMap<RepositoryName, RepositoryHealth> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
