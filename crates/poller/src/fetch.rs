//! Paginated run listing with per-call cache revalidation.

use runs::{
    RepositoryName, RevalidationPolicy, RunQuery, SourceError, WorkflowRun, WorkflowRunSource,
};
use tracing::{debug, instrument};

/// Fetches every page of runs in `repository` matching `query`.
///
/// The first page is always requested with forced revalidation; whether the
/// remaining pages keep forcing it is decided by [`RevalidationPolicy`] from
/// the first response. A failure on any page fails the whole call.
#[instrument(skip(source, query), fields(status = %query.status))]
pub async fn fetch_all_runs(
    source: &dyn WorkflowRunSource,
    repository: &RepositoryName,
    query: &RunQuery,
) -> Result<Vec<WorkflowRun>, SourceError> {
    let mut policy = RevalidationPolicy::new();

    let mut page = source
        .list_runs(repository, query, policy.directive())
        .await?;
    policy.record(page.cache_status);

    let mut runs = std::mem::take(&mut page.runs);
    let mut pages = 1usize;

    while let Some(cursor) = page.next.take() {
        page = source.next_page(&cursor, policy.directive()).await?;
        policy.record(page.cache_status);
        runs.append(&mut page.runs);
        pages += 1;
    }

    debug!(
        repository = %repository,
        pages,
        runs = runs.len(),
        "fetched workflow runs"
    );
    Ok(runs)
}
