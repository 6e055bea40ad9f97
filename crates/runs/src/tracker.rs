//! Run-state tracking.
//!
//! [`RunStateTracker`] turns a stream of polled [`WorkflowRun`] snapshots into
//! gauge and histogram updates. Per repository it remembers every run whose
//! last observed status was not `completed`; the gauge always equals the count
//! of remembered runs per `(status, name)`.
//!
//! A duration is recorded only for runs that were remembered before they were
//! seen as `completed`. Runs that start and finish between two polls, and runs
//! that were already finished when first seen, never produce a sample.
//!
//! Callers must look through every status they care about. A run passing
//! through a status nobody polls keeps counting under its last polled status
//! until it is seen again.
//!
//! Each repository has its own lock, so pollers working on different
//! repositories never contend beyond a brief lookup of the repository map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;

use crate::{MetricSurface, RepositoryName, RunId, RunStatus, WorkflowName, WorkflowRun};

type RepositoryRunState = HashMap<RunId, WorkflowRun>;

/// What a single [`RunStateTracker::observe`] call did.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// The run is (still) incomplete and is now tracked under its new status.
    Tracked {
        /// Status of the replaced snapshot, if the run was already tracked.
        previous: Option<RunStatus>,
    },
    /// A tracked run completed. `duration_seconds` is `None` when no usable
    /// start time was known.
    Completed { duration_seconds: Option<f64> },
    /// A completed run that was never tracked; nothing was emitted.
    Ignored,
}

/// Per-repository map of incomplete runs plus the metrics derived from it.
pub struct RunStateTracker {
    metrics: MetricSurface,
    repositories: RwLock<HashMap<RepositoryName, Arc<Mutex<RepositoryRunState>>>>,
}

impl RunStateTracker {
    pub fn new(metrics: MetricSurface) -> Self {
        Self {
            metrics,
            repositories: RwLock::new(HashMap::new()),
        }
    }

    pub fn metrics(&self) -> &MetricSurface {
        &self.metrics
    }

    fn state_for(&self, repository: &RepositoryName) -> Arc<Mutex<RepositoryRunState>> {
        if let Some(state) = self
            .repositories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(repository)
        {
            return Arc::clone(state);
        }

        let mut repositories = self
            .repositories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(repositories.entry(repository.clone()).or_default())
    }

    /// Applies one snapshot to the run-state map and the metric surface.
    pub fn observe(&self, run: WorkflowRun) -> Observation {
        debug!(
            run_id = %run.id,
            name = %run.name,
            status = %run.status,
            repository = %run.repository,
            "observing workflow run"
        );

        let state = self.state_for(&run.repository);
        let mut runs = state.lock().unwrap_or_else(PoisonError::into_inner);

        let previous = runs.remove(&run.id);

        if let Some(previous) = &previous {
            self.metrics
                .decrement_incomplete(&run.repository, &previous.status, &previous.name);
        }

        if run.status.is_completed() {
            let Some(previous) = previous else {
                return Observation::Ignored;
            };

            let duration_seconds = completed_duration(&previous, &run);
            match duration_seconds {
                Some(seconds) => {
                    self.metrics
                        .observe_duration(&run.repository, &run.name, seconds)
                }
                None => debug!(
                    run_id = %run.id,
                    repository = %run.repository,
                    "completed run has no usable start time; no duration recorded"
                ),
            }
            return Observation::Completed { duration_seconds };
        }

        self.metrics
            .increment_incomplete(&run.repository, &run.status, &run.name);
        let previous = previous.map(|p| p.status);
        runs.insert(run.id, run);
        Observation::Tracked { previous }
    }

    /// The tracked run in `repository` with the earliest start time
    /// (`run_started_at`, falling back to `created_at`).
    pub fn oldest_incomplete_run(&self, repository: &RepositoryName) -> Option<WorkflowRun> {
        let state = self
            .repositories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(repository)
            .map(Arc::clone)?;

        let runs = state.lock().unwrap_or_else(PoisonError::into_inner);
        runs.values()
            .min_by_key(|run| run.started_or_created())
            .cloned()
    }

    /// Number of runs tracked in `repository` with `status` and `name`.
    pub fn tracked_count(
        &self,
        repository: &RepositoryName,
        status: &RunStatus,
        name: &WorkflowName,
    ) -> usize {
        let Some(state) = self
            .repositories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(repository)
            .map(Arc::clone)
        else {
            return 0;
        };

        let runs = state.lock().unwrap_or_else(PoisonError::into_inner);
        runs.values()
            .filter(|run| &run.status == status && &run.name == name)
            .count()
    }
}

/// Seconds between the run's start and its final update.
///
/// The start comes from the tracked snapshot when it has one, otherwise from
/// the completing snapshot. A missing end time or a negative span yields no
/// sample.
fn completed_duration(previous: &WorkflowRun, completed: &WorkflowRun) -> Option<f64> {
    let started = previous.run_started_at.or(completed.run_started_at)?;
    let seconds = completed.updated_at?.seconds_since(started);
    (seconds >= 0.0).then_some(seconds)
}
