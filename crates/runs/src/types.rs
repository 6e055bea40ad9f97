//! Shared value types for the workflow-run domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! behaviour: statuses know whether they are terminal, timestamps know how to
//! truncate themselves to a cache-friendly bound, and a [`WorkflowRun`] knows
//! which instant it should be ordered by.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{RepositoryName, RunId, WorkflowName};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Creates a [`Timestamp`] from whole seconds since the Unix epoch.
    ///
    /// Returns `None` if `secs` is outside the representable range.
    pub fn from_unix_seconds(secs: i64) -> Option<Self> {
        DateTime::from_timestamp(secs, 0).map(Self)
    }

    /// Parses an RFC 3339 timestamp such as `"2024-05-01T12:34:56Z"`.
    pub fn parse_rfc3339(value: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Returns the first instant of the hour containing this timestamp.
    pub fn start_of_hour(self) -> Self {
        let secs = self.0.timestamp();
        DateTime::from_timestamp(secs - secs.rem_euclid(3600), 0).map_or(self, Self)
    }

    /// Signed number of seconds from `earlier` to `self`, with millisecond
    /// precision. Negative when `earlier` is actually later.
    pub fn seconds_since(self, earlier: Timestamp) -> f64 {
        (self.0 - earlier.0).num_milliseconds() as f64 / 1000.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
    }
}

// ---------------------------------------------------------------------------
// Run status
// ---------------------------------------------------------------------------

/// The status GitHub reports for a workflow run.
///
/// The set is open-ended; statuses this crate does not consume are carried
/// through verbatim in [`RunStatus::Other`] so they still label the gauge
/// correctly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Queued,
    InProgress,
    Waiting,
    Requested,
    Completed,
    Other(String),
}

impl RunStatus {
    /// Non-terminal statuses polled with a full listing every cycle, in
    /// request order.
    pub const INCOMPLETE: [RunStatus; 4] = [
        RunStatus::Queued,
        RunStatus::InProgress,
        RunStatus::Waiting,
        RunStatus::Requested,
    ];

    /// Returns the wire representation, e.g. `"in_progress"`.
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::Waiting => "waiting",
            RunStatus::Requested => "requested",
            RunStatus::Completed => "completed",
            RunStatus::Other(s) => s,
        }
    }

    /// Returns `true` for the single terminal status.
    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

impl From<String> for RunStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "queued" => RunStatus::Queued,
            "in_progress" => RunStatus::InProgress,
            "waiting" => RunStatus::Waiting,
            "requested" => RunStatus::Requested,
            "completed" => RunStatus::Completed,
            _ => RunStatus::Other(value),
        }
    }
}

impl From<&str> for RunStatus {
    fn from(value: &str) -> Self {
        RunStatus::from(value.to_string())
    }
}

impl From<RunStatus> for String {
    fn from(value: RunStatus) -> Self {
        match value {
            RunStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Workflow run snapshot
// ---------------------------------------------------------------------------

/// An immutable snapshot of one workflow run as returned by a single poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: RunId,
    pub name: WorkflowName,
    pub status: RunStatus,
    /// Repository the run belongs to; partitions run-state tracking.
    pub repository: RepositoryName,
    pub created_at: Timestamp,
    /// `None` until GitHub reports the run as started.
    pub run_started_at: Option<Timestamp>,
    /// `None` when GitHub sent no usable value; a completed run without it
    /// records no duration.
    pub updated_at: Option<Timestamp>,
}

impl WorkflowRun {
    /// The instant used to order incomplete runs: `run_started_at` when known,
    /// otherwise `created_at`.
    pub fn started_or_created(&self) -> Timestamp {
        self.run_started_at.unwrap_or(self.created_at)
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// The GitHub account whose repositories are monitored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "login")]
pub enum Account {
    User(String),
    Organization(String),
}

impl Account {
    /// Returns the login of the user or organisation.
    pub fn login(&self) -> &str {
        match self {
            Account::User(login) | Account::Organization(login) => login,
        }
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Account::User(login) => write!(f, "user {login}"),
            Account::Organization(login) => write!(f, "organization {login}"),
        }
    }
}
