//! The per-repository polling loop.
//!
//! Each cycle lists every incomplete status in full, then lists completed runs
//! created since the start of the hour in which the oldest still-tracked run
//! started. The hour truncation keeps the query string stable across cycles so
//! the HTTP cache can answer it. Runs that start and finish between two cycles
//! are never seen.

use std::sync::Arc;
use std::time::Duration;

use runs::{RepositoryName, RunQuery, RunStateTracker, RunStatus, WorkflowRunSource};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::fetch::fetch_all_runs;
use crate::health::{CycleReport, HealthRegistry};

/// Polls one repository forever (until shutdown).
pub struct PollScheduler {
    repository: RepositoryName,
    source: Arc<dyn WorkflowRunSource>,
    tracker: Arc<RunStateTracker>,
    interval: Duration,
}

impl PollScheduler {
    pub fn new(
        repository: RepositoryName,
        source: Arc<dyn WorkflowRunSource>,
        tracker: Arc<RunStateTracker>,
        interval: Duration,
    ) -> Self {
        Self {
            repository,
            source,
            tracker,
            interval,
        }
    }

    pub fn repository(&self) -> &RepositoryName {
        &self.repository
    }

    /// Runs one fetch-and-observe cycle. Fetch failures are logged and
    /// counted, never returned.
    pub async fn run_cycle(&self) -> CycleReport {
        info!(repository = %self.repository, "synchronizing with the GitHub API");
        let mut report = CycleReport::default();

        for status in RunStatus::INCOMPLETE {
            let query = RunQuery::with_status(status);
            self.fetch_and_observe(&query, &mut report).await;
        }

        if let Some(oldest) = self.tracker.oldest_incomplete_run(&self.repository) {
            let since = oldest.started_or_created().start_of_hour();
            debug!(
                repository = %self.repository,
                oldest_run = %oldest.id,
                %since,
                "fetching completed runs"
            );
            let query = RunQuery::with_status(RunStatus::Completed).created_since(since);
            self.fetch_and_observe(&query, &mut report).await;
        }

        report
    }

    async fn fetch_and_observe(&self, query: &RunQuery, report: &mut CycleReport) {
        report.fetches += 1;
        match fetch_all_runs(self.source.as_ref(), &self.repository, query).await {
            Ok(runs) => {
                report.observed += runs.len();
                for run in runs {
                    self.tracker.observe(run);
                }
            }
            Err(e) => {
                error!(
                    repository = %self.repository,
                    status = %query.status,
                    error = %e,
                    "failed to list workflow runs"
                );
                report.failures += 1;
                report.last_error = Some(e.to_string());
            }
        }
    }

    /// Cycles, then sleeps for the interval, until `shutdown` flips to `true`
    /// or its sender goes away.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>, health: HealthRegistry) {
        health.worker_started(&self.repository);
        info!(
            repository = %self.repository,
            interval_secs = self.interval.as_secs(),
            "repository poller started"
        );

        while !*shutdown.borrow() {
            health.cycle_started(&self.repository);
            let report = self.run_cycle().await;
            health.cycle_finished(&self.repository, &report);

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        health.worker_stopped(&self.repository);
        info!(repository = %self.repository, "repository poller stopped");
    }
}
