//! The metric surface shared by every worker.
//!
//! All three collectors are registered into a caller-supplied
//! [`prometheus::Registry`]; exposition is the caller's business. Collectors
//! are internally synchronised, so the surface can be shared freely across
//! tasks without further locking.

use prometheus::{HistogramOpts, HistogramVec, IntGauge, IntGaugeVec, Opts, Registry};

use crate::{RepositoryName, RunStatus, WorkflowName};

/// Gauge of runs currently tracked as incomplete.
pub const INCOMPLETE_WORKFLOW_RUNS: &str = "github_actions_incomplete_workflow_runs";
/// Histogram of completed-run durations.
pub const WORKFLOW_RUN_DURATION_SECONDS: &str = "github_actions_workflow_run_duration_seconds";
/// Gauge of the last sampled API quota.
pub const RATE_LIMIT_REMAINING: &str = "github_actions_exporter_rate_limit_remaining";

/// Histogram bucket upper bounds, in seconds.
///
/// Two fixed low buckets, then seven buckets starting at 15 s and doubling.
pub fn duration_buckets() -> Vec<f64> {
    let mut buckets = vec![5.0, 10.0];
    let mut bound = 15.0;
    for _ in 0..7 {
        buckets.push(bound);
        bound *= 2.0;
    }
    buckets
}

/// Handles to every collector the exporter publishes.
#[derive(Clone)]
pub struct MetricSurface {
    incomplete_workflow_runs: IntGaugeVec,
    workflow_run_duration: HistogramVec,
    rate_limit_remaining: IntGauge,
}

impl MetricSurface {
    /// Creates the collectors and registers them with `registry`.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let incomplete_workflow_runs = IntGaugeVec::new(
            Opts::new(
                INCOMPLETE_WORKFLOW_RUNS,
                "Current count of incomplete workflow runs",
            ),
            &["repository", "status", "name"],
        )?;

        let workflow_run_duration = HistogramVec::new(
            HistogramOpts::new(
                WORKFLOW_RUN_DURATION_SECONDS,
                "Workflow run duration for completed jobs, in seconds",
            )
            .buckets(duration_buckets()),
            &["repository", "name"],
        )?;

        let rate_limit_remaining = IntGauge::with_opts(Opts::new(
            RATE_LIMIT_REMAINING,
            "Remaining calls left for the GitHub v3 REST API",
        ))?;

        registry.register(Box::new(incomplete_workflow_runs.clone()))?;
        registry.register(Box::new(workflow_run_duration.clone()))?;
        registry.register(Box::new(rate_limit_remaining.clone()))?;

        Ok(Self {
            incomplete_workflow_runs,
            workflow_run_duration,
            rate_limit_remaining,
        })
    }

    pub fn increment_incomplete(
        &self,
        repository: &RepositoryName,
        status: &RunStatus,
        name: &WorkflowName,
    ) {
        self.incomplete_workflow_runs
            .with_label_values(&[repository.as_str(), status.as_str(), name.as_str()])
            .inc();
    }

    pub fn decrement_incomplete(
        &self,
        repository: &RepositoryName,
        status: &RunStatus,
        name: &WorkflowName,
    ) {
        self.incomplete_workflow_runs
            .with_label_values(&[repository.as_str(), status.as_str(), name.as_str()])
            .dec();
    }

    /// Current gauge value for one label set; `0` for a series never touched.
    pub fn incomplete(&self, repository: &RepositoryName, status: &RunStatus, name: &WorkflowName) -> i64 {
        self.incomplete_workflow_runs
            .with_label_values(&[repository.as_str(), status.as_str(), name.as_str()])
            .get()
    }

    pub fn observe_duration(&self, repository: &RepositoryName, name: &WorkflowName, seconds: f64) {
        self.workflow_run_duration
            .with_label_values(&[repository.as_str(), name.as_str()])
            .observe(seconds);
    }

    /// Number of duration samples and their sum for one label set.
    pub fn duration_samples(&self, repository: &RepositoryName, name: &WorkflowName) -> (u64, f64) {
        let histogram = self
            .workflow_run_duration
            .with_label_values(&[repository.as_str(), name.as_str()]);
        (histogram.get_sample_count(), histogram.get_sample_sum())
    }

    pub fn set_rate_limit_remaining(&self, remaining: u64) {
        self.rate_limit_remaining
            .set(i64::try_from(remaining).unwrap_or(i64::MAX));
    }

    pub fn rate_limit_remaining(&self) -> i64 {
        self.rate_limit_remaining.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_match_the_documented_layout() {
        assert_eq!(
            duration_buckets(),
            vec![5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 240.0, 480.0, 960.0]
        );
    }

    #[test]
    fn registration_exposes_all_three_families() {
        let registry = Registry::new();
        let metrics = MetricSurface::new(&registry).unwrap();

        let repo = RepositoryName::new("acme/widgets").unwrap();
        let name = WorkflowName::new("build").unwrap();
        metrics.increment_incomplete(&repo, &RunStatus::Queued, &name);
        metrics.observe_duration(&repo, &name, 12.0);
        metrics.set_rate_limit_remaining(4999);

        let mut families: Vec<String> = registry
            .gather()
            .into_iter()
            .map(|family| family.get_name().to_string())
            .collect();
        families.sort();
        assert_eq!(
            families,
            vec![
                RATE_LIMIT_REMAINING.to_string(),
                INCOMPLETE_WORKFLOW_RUNS.to_string(),
                WORKFLOW_RUN_DURATION_SECONDS.to_string(),
            ]
        );
    }

    #[test]
    fn double_registration_is_rejected() {
        let registry = Registry::new();
        MetricSurface::new(&registry).unwrap();
        assert!(MetricSurface::new(&registry).is_err());
    }

    #[test]
    fn rate_limit_gauge_holds_last_sample() {
        let metrics = MetricSurface::new(&Registry::new()).unwrap();
        metrics.set_rate_limit_remaining(5000);
        metrics.set_rate_limit_remaining(4321);
        assert_eq!(metrics.rate_limit_remaining(), 4321);
    }
}
