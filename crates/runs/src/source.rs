//! Port traits for the GitHub-facing collaborators.
//!
//! These are the only calls the tracking and polling logic makes against the
//! outside world: list runs, fetch the next page of a listing, enumerate
//! repositories and read the remaining API quota. The `github` crate supplies
//! the production implementations; tests supply in-memory fakes.

use async_trait::async_trait;

use crate::{Account, RepositoryName, RunStatus, SourceError, Timestamp, WorkflowRun};

// ---------------------------------------------------------------------------
// Cache control
// ---------------------------------------------------------------------------

/// How the HTTP response cache should treat a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDirective {
    /// Check with the origin even if the cached entry has not expired
    /// (`Cache-Control: no-cache`).
    ForceRevalidate,
    /// Serve unexpired entries from the cache; revalidate expired ones.
    Default,
}

impl CacheDirective {
    /// The `Cache-Control` request header value for this directive, if any.
    pub fn header_value(self) -> Option<&'static str> {
        match self {
            CacheDirective::ForceRevalidate => Some("no-cache"),
            CacheDirective::Default => None,
        }
    }
}

/// What the response cache did for one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Nothing was cached; the origin response was used.
    Miss,
    /// An unexpired cached entry was served without contacting the origin.
    Fresh,
    /// A cached entry existed, the origin confirmed it unchanged (`304`).
    Valid,
    /// A cached entry existed but the origin returned new content.
    Invalid,
    /// The response cannot be cached (no validator).
    Uncacheable,
}

impl CacheStatus {
    /// Returns `true` when the origin confirmed the cached entry unchanged.
    pub fn is_validated(self) -> bool {
        matches!(self, CacheStatus::Valid)
    }
}

// ---------------------------------------------------------------------------
// Run listing
// ---------------------------------------------------------------------------

/// Filter for one run listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunQuery {
    pub status: RunStatus,
    /// Only runs created at or after this instant.
    pub created_since: Option<Timestamp>,
}

impl RunQuery {
    /// A full, unbounded listing of runs with `status`.
    pub fn with_status(status: RunStatus) -> Self {
        Self {
            status,
            created_since: None,
        }
    }

    /// Restricts the listing to runs created at or after `since`.
    pub fn created_since(mut self, since: Timestamp) -> Self {
        self.created_since = Some(since);
        self
    }
}

/// Opaque handle to the next page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor(String);

impl PageCursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of a run listing.
#[derive(Debug, Clone)]
pub struct RunPage {
    pub runs: Vec<WorkflowRun>,
    /// `None` on the last page.
    pub next: Option<PageCursor>,
    pub cache_status: CacheStatus,
}

/// Lists workflow runs for a repository, one page at a time.
#[async_trait]
pub trait WorkflowRunSource: Send + Sync {
    /// Fetches the first page of runs in `repository` matching `query`.
    async fn list_runs(
        &self,
        repository: &RepositoryName,
        query: &RunQuery,
        directive: CacheDirective,
    ) -> Result<RunPage, SourceError>;

    /// Fetches the page `cursor` points at.
    async fn next_page(
        &self,
        cursor: &PageCursor,
        directive: CacheDirective,
    ) -> Result<RunPage, SourceError>;
}

// ---------------------------------------------------------------------------
// Repositories and quota
// ---------------------------------------------------------------------------

/// Enumerates every repository owned by an account, across all pages.
#[async_trait]
pub trait RepositoryDirectory: Send + Sync {
    async fn list_repositories(&self, account: &Account)
        -> Result<Vec<RepositoryName>, SourceError>;
}

/// Reports the remaining API request quota.
#[async_trait]
pub trait RateLimitSource: Send + Sync {
    async fn remaining(&self) -> Result<u64, SourceError>;
}
