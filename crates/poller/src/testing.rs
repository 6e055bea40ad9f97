//! In-memory fakes shared by the unit tests of this crate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use prometheus::Registry;
use runs::{
    CacheDirective, CacheStatus, MetricSurface, PageCursor, RepositoryName, RunId, RunPage,
    RunQuery, RunStateTracker, RunStatus, SourceError, Timestamp, WorkflowName, WorkflowRun,
    WorkflowRunSource,
};

pub fn repo(name: &str) -> RepositoryName {
    RepositoryName::new(name).unwrap()
}

pub fn tracker() -> Arc<RunStateTracker> {
    Arc::new(RunStateTracker::new(
        MetricSurface::new(&Registry::new()).unwrap(),
    ))
}

pub fn run_with(repository: &str, id: u64, status: RunStatus) -> WorkflowRun {
    let created = Timestamp::parse_rfc3339("2024-05-01T12:00:00Z").unwrap();
    WorkflowRun {
        id: RunId::new(id),
        name: WorkflowName::new("build").unwrap(),
        status,
        repository: repo(repository),
        created_at: created,
        run_started_at: None,
        updated_at: Some(created),
    }
}

pub fn queued_run(repository: &str, id: u64) -> WorkflowRun {
    run_with(repository, id, RunStatus::Queued)
}

/// Single-page source answering per status; unknown statuses list nothing.
#[derive(Default)]
pub struct FakeRunSource {
    responses: Mutex<HashMap<String, Vec<WorkflowRun>>>,
    failing: Mutex<Vec<String>>,
    queries: Mutex<Vec<RunQuery>>,
}

impl FakeRunSource {
    pub fn respond(&self, status: RunStatus, runs: Vec<WorkflowRun>) {
        self.responses
            .lock()
            .unwrap()
            .insert(status.as_str().to_string(), runs);
    }

    pub fn fail(&self, status: RunStatus) {
        self.failing
            .lock()
            .unwrap()
            .push(status.as_str().to_string());
    }

    pub fn requested_statuses(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|q| !q.status.is_completed())
            .map(|q| q.status.as_str().to_string())
            .collect()
    }

    pub fn completed_queries(&self) -> Vec<Option<Timestamp>> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|q| q.status.is_completed())
            .map(|q| q.created_since)
            .collect()
    }
}

#[async_trait]
impl WorkflowRunSource for FakeRunSource {
    async fn list_runs(
        &self,
        _repository: &RepositoryName,
        query: &RunQuery,
        _directive: CacheDirective,
    ) -> Result<RunPage, SourceError> {
        self.queries.lock().unwrap().push(query.clone());
        let status = query.status.as_str().to_string();

        if self.failing.lock().unwrap().contains(&status) {
            return Err(SourceError::Transport {
                message: format!("listing {status} timed out"),
            });
        }

        let runs = self
            .responses
            .lock()
            .unwrap()
            .get(&status)
            .cloned()
            .unwrap_or_default();
        Ok(RunPage {
            runs,
            next: None,
            cache_status: CacheStatus::Miss,
        })
    }

    async fn next_page(
        &self,
        cursor: &PageCursor,
        _directive: CacheDirective,
    ) -> Result<RunPage, SourceError> {
        Err(SourceError::Decode {
            message: format!("unexpected cursor {}", cursor.as_str()),
        })
    }
}
