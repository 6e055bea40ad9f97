//! The GitHub REST client and its port implementations.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, CACHE_CONTROL, ETAG, IF_NONE_MATCH, LINK};
use reqwest::{StatusCode, Url};
use runs::{
    Account, CacheDirective, CacheStatus, PageCursor, RateLimitSource, RepositoryDirectory,
    RepositoryName, RevalidationPolicy, RunPage, RunQuery, SourceError, Timestamp,
    WorkflowRunSource,
};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::auth::{Authenticator, Credentials};
use crate::cache::{parse_max_age, ResponseCache};
use crate::config::ClientConfig;
use crate::error::GitHubError;
use crate::models::{RateLimitResponse, RepositoryPayload, WorkflowRunsResponse};
use crate::pagination::next_link;

const GITHUB_API_VERSION: &str = "2022-11-28";

/// Whether a request may use the response cache at all.
#[derive(Debug, Clone, Copy)]
enum CacheMode {
    Use(CacheDirective),
    Bypass,
}

/// A decoded response plus what the cache did for it.
struct Fetched<T> {
    value: T,
    next: Option<String>,
    cache_status: CacheStatus,
}

/// GitHub REST API client.
///
/// Cheap to clone: the HTTP connection pool, credentials and response cache
/// are shared between clones.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    auth: Arc<Authenticator>,
    cache: ResponseCache,
}

impl GitHubClient {
    pub fn new(
        config: ClientConfig,
        credentials: Credentials,
        cache: ResponseCache,
    ) -> Result<Self, GitHubError> {
        Url::parse(&config.api_base_url).map_err(|e| GitHubError::InvalidConfig {
            field: "api_base_url",
            reason: e.to_string(),
        })?;

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            config: Arc::new(config),
            auth: Arc::new(Authenticator::new(credentials)),
            cache,
        })
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, GitHubError> {
        let mut url = Url::parse(&format!("{}{path}", self.config.api_base_url)).map_err(|e| {
            GitHubError::InvalidConfig {
                field: "api_base_url",
                reason: e.to_string(),
            }
        })?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        Ok(url)
    }

    fn runs_url(&self, repository: &RepositoryName, query: &RunQuery) -> Result<Url, GitHubError> {
        let mut params = vec![
            ("status", query.status.as_str().to_string()),
            ("per_page", self.config.per_page.to_string()),
        ];
        if let Some(since) = query.created_since {
            params.push(("created", format!(">={since}")));
        }
        self.endpoint(&format!("/repos/{repository}/actions/runs"), &params)
    }

    fn repositories_url(&self, account: &Account) -> Result<Url, GitHubError> {
        let scope = match account {
            Account::User(_) => "users",
            Account::Organization(_) => "orgs",
        };
        self.endpoint(
            &format!("/{scope}/{}/repos", account.login()),
            &[("per_page", self.config.per_page.to_string())],
        )
    }

    /// Performs a cache-aware GET and decodes the body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        mode: CacheMode,
    ) -> Result<Fetched<T>, GitHubError> {
        let (body, next, cache_status) = self.get_body(url, mode).await?;
        Ok(Fetched {
            value: serde_json::from_str(&body)?,
            next,
            cache_status,
        })
    }

    async fn get_body(
        &self,
        url: &str,
        mode: CacheMode,
    ) -> Result<(String, Option<String>, CacheStatus), GitHubError> {
        let cached = match mode {
            CacheMode::Use(_) => self.cache.get(url),
            CacheMode::Bypass => None,
        };

        if let (CacheMode::Use(CacheDirective::Default), Some(entry)) = (mode, &cached) {
            if entry.is_fresh(Instant::now()) {
                debug!(%url, "serving fresh response from cache");
                return Ok((entry.body.clone(), entry.next.clone(), CacheStatus::Fresh));
            }
        }

        let token = self
            .auth
            .bearer_token(&self.http, &self.config.api_base_url)
            .await?;
        let mut request = self
            .http
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .bearer_auth(token.expose_secret());
        if let CacheMode::Use(directive) = mode {
            if let Some(value) = directive.header_value() {
                request = request.header(CACHE_CONTROL, value);
            }
        }
        if let Some(entry) = &cached {
            request = request.header(IF_NONE_MATCH, entry.etag.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let max_age = parse_max_age(header_str(&headers, CACHE_CONTROL.as_str()));

        if status == StatusCode::NOT_MODIFIED {
            let entry = self
                .cache
                .revalidated(url, max_age)
                .ok_or_else(|| GitHubError::UnexpectedNotModified {
                    url: url.to_string(),
                })?;
            debug!(%url, "cached response revalidated");
            return Ok((entry.body, entry.next, CacheStatus::Valid));
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &headers, message));
        }

        let next = header_str(&headers, LINK.as_str()).and_then(next_link);
        let body = response.text().await?;

        let cache_status = match (mode, header_str(&headers, ETAG.as_str())) {
            (CacheMode::Use(_), Some(etag)) => {
                self.cache
                    .store(url, etag.to_string(), body.clone(), next.clone(), max_age);
                if cached.is_some() {
                    CacheStatus::Invalid
                } else {
                    CacheStatus::Miss
                }
            }
            _ => CacheStatus::Uncacheable,
        };

        Ok((body, next, cache_status))
    }

    fn run_page(fetched: Fetched<WorkflowRunsResponse>) -> RunPage {
        RunPage {
            runs: fetched.value.into_runs(),
            next: fetched.next.map(PageCursor::new),
            cache_status: fetched.cache_status,
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Maps a non-success response to an error, recognising quota exhaustion.
fn classify_failure(status: StatusCode, headers: &HeaderMap, message: String) -> GitHubError {
    let exhausted = header_str(headers, "x-ratelimit-remaining") == Some("0");
    if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && exhausted) {
        let reset_at = header_str(headers, "x-ratelimit-reset")
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(Timestamp::from_unix_seconds);
        return GitHubError::RateLimited { reset_at };
    }

    let message = if message.is_empty() {
        status.canonical_reason().unwrap_or_default().to_string()
    } else {
        message
    };
    GitHubError::Api {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl WorkflowRunSource for GitHubClient {
    #[instrument(skip(self, query), fields(status = %query.status))]
    async fn list_runs(
        &self,
        repository: &RepositoryName,
        query: &RunQuery,
        directive: CacheDirective,
    ) -> Result<RunPage, SourceError> {
        debug!("fetching runs");
        let url = self.runs_url(repository, query)?;
        let fetched = self
            .get_json::<WorkflowRunsResponse>(url.as_str(), CacheMode::Use(directive))
            .await?;
        Ok(Self::run_page(fetched))
    }

    async fn next_page(
        &self,
        cursor: &PageCursor,
        directive: CacheDirective,
    ) -> Result<RunPage, SourceError> {
        let fetched = self
            .get_json::<WorkflowRunsResponse>(cursor.as_str(), CacheMode::Use(directive))
            .await?;
        Ok(Self::run_page(fetched))
    }
}

#[async_trait]
impl RepositoryDirectory for GitHubClient {
    #[instrument(skip(self))]
    async fn list_repositories(
        &self,
        account: &Account,
    ) -> Result<Vec<RepositoryName>, SourceError> {
        debug!(%account, "listing repositories");
        let mut policy = RevalidationPolicy::new();
        let mut url = Some(self.repositories_url(account)?.to_string());
        let mut repositories = Vec::new();

        while let Some(current) = url.take() {
            let fetched = self
                .get_json::<Vec<RepositoryPayload>>(&current, CacheMode::Use(policy.directive()))
                .await?;
            policy.record(fetched.cache_status);
            for payload in fetched.value {
                repositories.push(payload.into_domain()?);
            }
            url = fetched.next;
        }

        debug!(%account, count = repositories.len(), "listed repositories");
        Ok(repositories)
    }
}

#[async_trait]
impl RateLimitSource for GitHubClient {
    async fn remaining(&self) -> Result<u64, SourceError> {
        let url = self.endpoint("/rate_limit", &[])?;
        let fetched = self
            .get_json::<RateLimitResponse>(url.as_str(), CacheMode::Bypass)
            .await?;
        fetched
            .value
            .core_remaining()
            .ok_or_else(|| SourceError::Decode {
                message: "rate limit response has no remaining count".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::body::Body;
    use axum::extract::State;
    use axum::http::{HeaderMap as RequestHeaders, Response, Uri};
    use axum::Router;
    use runs::{RunId, RunStatus};
    use secrecy::SecretString;

    use super::*;

    #[derive(Debug, Clone)]
    struct Seen {
        target: String,
        cache_control: Option<String>,
        if_none_match: Option<String>,
    }

    type Responder = Arc<dyn Fn(&Seen) -> Response<Body> + Send + Sync>;

    #[derive(Clone)]
    struct FakeGitHub {
        seen: Arc<Mutex<Vec<Seen>>>,
        respond: Responder,
    }

    async fn handle(
        State(fake): State<FakeGitHub>,
        uri: Uri,
        headers: RequestHeaders,
    ) -> Response<Body> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let seen = Seen {
            target: uri.path_and_query().map(|p| p.to_string()).unwrap_or_default(),
            cache_control: header("cache-control"),
            if_none_match: header("if-none-match"),
        };
        fake.seen.lock().unwrap().push(seen.clone());
        (fake.respond)(&seen)
    }

    struct Harness {
        client: GitHubClient,
        seen: Arc<Mutex<Vec<Seen>>>,
    }

    impl Harness {
        fn requests(&self) -> Vec<Seen> {
            self.seen.lock().unwrap().clone()
        }
    }

    /// Serves `respond` on an ephemeral port. The closure also receives the
    /// server's base URL so it can build `Link` headers.
    async fn harness<F>(respond: F) -> Harness
    where
        F: Fn(&Seen, &str) -> Response<Body> + Send + Sync + 'static,
    {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let server_base = base.clone();
        let fake = FakeGitHub {
            seen: seen.clone(),
            respond: Arc::new(move |request: &Seen| respond(request, &server_base)),
        };
        let app = Router::new().fallback(handle).with_state(fake);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = GitHubClient::new(
            ClientConfig::with_base_url(base),
            Credentials::Token(SecretString::from("ghp_test".to_string())),
            ResponseCache::new(),
        )
        .unwrap();
        Harness { client, seen }
    }

    fn json(status: u16, headers: &[(&str, String)], body: String) -> Response<Body> {
        let mut builder = Response::builder()
            .status(status)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn runs_body(ids: &[u64]) -> String {
        let runs: Vec<_> = ids
            .iter()
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "name": "Build",
                    "status": "in_progress",
                    "repository": { "full_name": "octo-org/hello-world" },
                    "created_at": "2024-05-01T12:00:00Z",
                    "run_started_at": "2024-05-01T12:00:05Z",
                    "updated_at": "2024-05-01T12:01:00Z"
                })
            })
            .collect();
        serde_json::json!({ "total_count": ids.len(), "workflow_runs": runs }).to_string()
    }

    fn repo() -> RepositoryName {
        RepositoryName::new("octo-org/hello-world").unwrap()
    }

    fn in_progress() -> RunQuery {
        RunQuery::with_status(RunStatus::InProgress)
    }

    #[tokio::test]
    async fn etag_revalidation_and_fresh_hits() {
        let h = harness(|seen, _| {
            if seen.if_none_match.as_deref() == Some("\"v1\"") {
                return json(
                    304,
                    &[("cache-control", "private, max-age=60".to_string())],
                    String::new(),
                );
            }
            json(
                200,
                &[
                    ("etag", "\"v1\"".to_string()),
                    ("cache-control", "private, max-age=60".to_string()),
                ],
                runs_body(&[7]),
            )
        })
        .await;

        let first = h
            .client
            .list_runs(&repo(), &in_progress(), CacheDirective::ForceRevalidate)
            .await
            .unwrap();
        assert_eq!(first.cache_status, CacheStatus::Miss);
        assert_eq!(first.runs.len(), 1);

        let second = h
            .client
            .list_runs(&repo(), &in_progress(), CacheDirective::ForceRevalidate)
            .await
            .unwrap();
        assert_eq!(second.cache_status, CacheStatus::Valid);
        assert_eq!(second.runs[0].id, first.runs[0].id);

        // Fresh for max-age: no request leaves the process.
        let third = h
            .client
            .list_runs(&repo(), &in_progress(), CacheDirective::Default)
            .await
            .unwrap();
        assert_eq!(third.cache_status, CacheStatus::Fresh);

        let requests = h.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].cache_control.as_deref(), Some("no-cache"));
        assert_eq!(requests[0].if_none_match, None);
        assert_eq!(requests[1].if_none_match.as_deref(), Some("\"v1\""));
        assert!(requests[0]
            .target
            .starts_with("/repos/octo-org/hello-world/actions/runs?status=in_progress&per_page=100"));
    }

    #[tokio::test]
    async fn changed_response_is_reported_invalid() {
        let counter = Arc::new(Mutex::new(0u32));
        let h = harness(move |_, _| {
            let n = {
                let mut count = counter.lock().unwrap();
                *count += 1;
                *count
            };
            json(200, &[("etag", format!("\"v{n}\""))], runs_body(&[u64::from(n)]))
        })
        .await;

        let first = h
            .client
            .list_runs(&repo(), &in_progress(), CacheDirective::ForceRevalidate)
            .await
            .unwrap();
        let second = h
            .client
            .list_runs(&repo(), &in_progress(), CacheDirective::Default)
            .await
            .unwrap();

        assert_eq!(first.cache_status, CacheStatus::Miss);
        assert_eq!(second.cache_status, CacheStatus::Invalid);
        assert_eq!(second.runs[0].id, RunId::new(2));
        // max-age absent: the entry is stale at once and revalidated.
        assert_eq!(h.requests()[1].if_none_match.as_deref(), Some("\"v1\""));
        assert_eq!(h.requests()[1].cache_control, None);
    }

    #[tokio::test]
    async fn created_filter_and_link_pagination() {
        let h = harness(|seen, base| {
            if seen.target.starts_with("/page2") {
                return json(200, &[], runs_body(&[3]));
            }
            json(
                200,
                &[(
                    "link",
                    format!("<{base}/page2>; rel=\"next\", <{base}/page2>; rel=\"last\""),
                )],
                runs_body(&[1, 2]),
            )
        })
        .await;

        let since = Timestamp::parse_rfc3339("2024-05-01T12:00:00Z").unwrap();
        let query = RunQuery::with_status(RunStatus::Completed).created_since(since);
        let first = h
            .client
            .list_runs(&repo(), &query, CacheDirective::ForceRevalidate)
            .await
            .unwrap();
        assert_eq!(first.cache_status, CacheStatus::Uncacheable);
        let cursor = first.next.expect("first page links to the next");

        let second = h
            .client
            .next_page(&cursor, CacheDirective::Default)
            .await
            .unwrap();
        assert_eq!(second.runs.len(), 1);
        assert!(second.next.is_none());

        let target = &h.requests()[0].target;
        assert!(target.contains("status=completed"));
        assert!(target.contains("created=%3E%3D2024-05-01T12%3A00%3A00Z"));
    }

    #[tokio::test]
    async fn bad_timestamps_skip_only_the_affected_run() {
        let h = harness(|_, _| {
            let body = serde_json::json!({
                "total_count": 2,
                "workflow_runs": [
                    {
                        "id": 1, "name": "Build", "status": "queued",
                        "repository": { "full_name": "octo-org/hello-world" },
                        "created_at": "2024-05-01T12:00:00Z",
                        "updated_at": "2024-05-01T12:00:00Z"
                    },
                    {
                        "id": 2, "name": "Build", "status": "queued",
                        "repository": { "full_name": "octo-org/hello-world" },
                        "created_at": "yesterday",
                        "updated_at": null
                    },
                    {
                        "id": 3, "name": "Build", "status": "queued",
                        "repository": { "full_name": "octo-org/hello-world" },
                        "created_at": "2024-05-01T12:00:00Z",
                        "run_started_at": "not-a-time",
                        "updated_at": null
                    }
                ]
            });
            json(200, &[], body.to_string())
        })
        .await;

        let page = h
            .client
            .list_runs(
                &repo(),
                &RunQuery::with_status(RunStatus::Queued),
                CacheDirective::ForceRevalidate,
            )
            .await
            .unwrap();

        let ids: Vec<_> = page.runs.iter().map(|run| run.id).collect();
        assert_eq!(ids, [RunId::new(1), RunId::new(3)]);
        assert!(page.runs[1].run_started_at.is_none());
    }

    #[tokio::test]
    async fn exhausted_quota_maps_to_rate_limited() {
        let h = harness(|_, _| {
            json(
                403,
                &[
                    ("x-ratelimit-remaining", "0".to_string()),
                    ("x-ratelimit-reset", "1700000000".to_string()),
                ],
                r#"{"message": "API rate limit exceeded"}"#.to_string(),
            )
        })
        .await;

        let err = h
            .client
            .list_runs(&repo(), &in_progress(), CacheDirective::ForceRevalidate)
            .await
            .unwrap_err();
        match err {
            SourceError::RateLimited { reset_at } => {
                assert_eq!(reset_at, Timestamp::from_unix_seconds(1_700_000_000));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_failures_map_to_api_errors() {
        let h = harness(|_, _| json(404, &[], r#"{"message": "Not Found"}"#.to_string())).await;

        let err = h
            .client
            .list_runs(&repo(), &in_progress(), CacheDirective::ForceRevalidate)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn repositories_are_listed_across_pages() {
        let h = harness(|seen, base| {
            let repos = |names: &[&str]| {
                serde_json::Value::Array(
                    names
                        .iter()
                        .map(|n| serde_json::json!({ "full_name": n }))
                        .collect(),
                )
                .to_string()
            };
            if seen.target.starts_with("/orgs/octo-org/repos") {
                json(
                    200,
                    &[("link", format!("<{base}/orgs-page2>; rel=\"next\""))],
                    repos(&["octo-org/a", "octo-org/b"]),
                )
            } else {
                json(200, &[], repos(&["octo-org/c"]))
            }
        })
        .await;

        let names = h
            .client
            .list_repositories(&Account::Organization("octo-org".to_string()))
            .await
            .unwrap();
        let names: Vec<_> = names.iter().map(|n| n.as_str().to_string()).collect();
        assert_eq!(names, ["octo-org/a", "octo-org/b", "octo-org/c"]);
        assert_eq!(h.requests()[0].cache_control.as_deref(), Some("no-cache"));
    }

    #[tokio::test]
    async fn user_repositories_use_the_login_path() {
        let h = harness(|_, _| json(200, &[], "[]".to_string())).await;

        let names = h
            .client
            .list_repositories(&Account::User("octocat".to_string()))
            .await
            .unwrap();

        assert!(names.is_empty());
        assert_eq!(h.requests()[0].target, "/users/octocat/repos?per_page=100");
    }

    #[tokio::test]
    async fn rate_limit_endpoint_bypasses_the_cache() {
        let h = harness(|_, _| {
            json(
                200,
                &[("etag", "\"r\"".to_string())],
                r#"{"resources": {"core": {"limit": 5000, "remaining": 4321}}}"#.to_string(),
            )
        })
        .await;

        assert_eq!(h.client.remaining().await.unwrap(), 4321);
        assert_eq!(h.client.remaining().await.unwrap(), 4321);

        let requests = h.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.if_none_match.is_none()));
        assert!(h.client.cache().is_empty());
    }
}
