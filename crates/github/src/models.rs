//! Wire payloads and their conversion into domain types.

use chrono::{DateTime, Utc};
use runs::{RepositoryName, RunId, RunStatus, Timestamp, WorkflowName, WorkflowRun};
use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::error::GitHubError;

/// One page of `GET /repos/{owner}/{repo}/actions/runs`.
///
/// Runs are kept undecoded so one malformed entry costs only itself.
#[derive(Debug, Deserialize)]
pub(crate) struct WorkflowRunsResponse {
    pub workflow_runs: Vec<serde_json::Value>,
}

impl WorkflowRunsResponse {
    /// Decodes every run, skipping (and logging) the ones that cannot be used.
    pub fn into_runs(self) -> Vec<WorkflowRun> {
        self.workflow_runs
            .into_iter()
            .filter_map(|value| {
                let id = value.get("id").and_then(serde_json::Value::as_u64);
                let decoded = serde_json::from_value::<WorkflowRunPayload>(value)
                    .map_err(GitHubError::from)
                    .and_then(WorkflowRunPayload::into_domain);
                match decoded {
                    Ok(run) => Some(run),
                    Err(e) => {
                        warn!(run_id = ?id, error = %e, "skipping undecodable workflow run");
                        None
                    }
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkflowRunPayload {
    pub id: u64,
    pub name: Option<String>,
    pub status: Option<String>,
    pub repository: RepositoryPayload,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub run_started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// RFC 3339 timestamp; `null`, a non-string or an unparseable value is `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct RepositoryPayload {
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateLimitResponse {
    #[serde(default)]
    pub resources: Option<RateLimitResources>,
    #[serde(default)]
    pub rate: Option<RateLimitBucket>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateLimitResources {
    pub core: RateLimitBucket,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateLimitBucket {
    pub remaining: u64,
}

impl RateLimitResponse {
    /// Core REST quota, falling back to the legacy top-level `rate` field.
    pub fn core_remaining(&self) -> Option<u64> {
        self.resources
            .as_ref()
            .map(|r| r.core.remaining)
            .or_else(|| self.rate.as_ref().map(|r| r.remaining))
    }
}

impl RepositoryPayload {
    pub fn into_domain(self) -> Result<RepositoryName, GitHubError> {
        RepositoryName::new(self.full_name).ok_or(GitHubError::InvalidValue {
            field: "repository.full_name",
            reason: "must not be empty".to_string(),
        })
    }
}

impl WorkflowRunPayload {
    pub fn into_domain(self) -> Result<WorkflowRun, GitHubError> {
        // GitHub omits the name for some runs (e.g. deleted workflow files).
        let name = self
            .name
            .and_then(WorkflowName::new)
            .or_else(|| WorkflowName::new("unknown"))
            .ok_or(GitHubError::InvalidValue {
                field: "name",
                reason: "must not be empty".to_string(),
            })?;
        let status = self
            .status
            .map_or_else(|| RunStatus::Other("unknown".to_string()), RunStatus::from);
        let created_at = self.created_at.ok_or(GitHubError::InvalidValue {
            field: "created_at",
            reason: "missing or not an RFC 3339 timestamp".to_string(),
        })?;

        Ok(WorkflowRun {
            id: RunId::new(self.id),
            name,
            status,
            repository: self.repository.into_domain()?,
            created_at: Timestamp::from_utc(created_at),
            run_started_at: self.run_started_at.map(Timestamp::from_utc),
            updated_at: self.updated_at.map(Timestamp::from_utc),
        })
    }
}
