//! GitHub Actions exporter entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: flags and `GITHUB_ACTIONS_EXPORTER_*`
//!    environment variables, validated into explicit config structs.
//! 2. **Wire observability**: `tracing-subscriber` with a text or JSON layer
//!    and, when an endpoint is configured, an OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure**: one shared Prometheus registry, one
//!    response cache, one [`github::GitHubClient`] injected into every worker.
//! 4. **Run**: enumerate repositories, start one [`poller::PollScheduler`]
//!    per repository plus the [`poller::RateWatcher`], and serve `/metrics`
//!    and `/health` until ctrl-c.

mod config;
mod server;
mod telemetry;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use github::{GitHubClient, ResponseCache};
use poller::{PollScheduler, RateWatcher, Supervisor};
use prometheus::Registry;
use runs::{MetricSurface, RepositoryDirectory, RunStateTracker, WorkflowRunSource};
use tracing::{error, info, warn};

use crate::config::Options;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = Options::parse();
    let telemetry = telemetry::init(
        &options.log_level,
        options.log_format,
        options.otlp_endpoint.as_deref(),
    )?;

    let result = run(options).await;
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "exporter stopped with an error");
    }

    telemetry.shutdown();
    result
}

async fn run(options: Options) -> anyhow::Result<()> {
    let settings = options.into_settings()?;
    info!(account = %settings.account, "GitHub Actions exporter starting");

    let registry = Registry::new();
    let metrics = MetricSurface::new(&registry).context("failed to register metrics")?;
    let tracker = Arc::new(RunStateTracker::new(metrics.clone()));

    let client = GitHubClient::new(
        settings.client.clone(),
        settings.credentials.clone(),
        ResponseCache::new(),
    )
    .context("failed to build GitHub client")?;

    let repositories = client
        .list_repositories(&settings.account)
        .await
        .with_context(|| format!("failed to list repositories for {}", settings.account))?;
    let discovered = repositories.len();
    let repositories = settings.select(repositories);
    info!(
        discovered,
        selected = repositories.len(),
        "repositories enumerated"
    );
    if repositories.is_empty() {
        warn!("no repositories matched; only the rate limit will be exported");
    }

    let listener = tokio::net::TcpListener::bind(settings.listen_address)
        .await
        .with_context(|| format!("failed to bind {}", settings.listen_address))?;

    let interval = settings.poller.interval();
    let source: Arc<dyn WorkflowRunSource> = Arc::new(client.clone());
    let mut supervisor = Supervisor::new();
    for repository in repositories {
        supervisor.spawn_repository(PollScheduler::new(
            repository,
            source.clone(),
            tracker.clone(),
            interval,
        ));
    }
    supervisor.spawn_rate_watcher(RateWatcher::new(Arc::new(client), metrics, interval));
    info!(
        workers = supervisor.worker_count(),
        interval_secs = interval.as_secs(),
        "workers started"
    );

    info!(address = %settings.listen_address, "serving /metrics and /health");

    let shutdown = supervisor.shutdown_handle();
    let app = server::router(registry, supervisor.health());
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!(error = %e, "failed to listen for ctrl-c; shutting down"),
            }
            shutdown.trigger();
        })
        .await
        .context("metrics server failed");

    // Stop the workers even when the server failed.
    supervisor.shutdown_handle().trigger();
    supervisor.join().await;
    served?;

    info!("GitHub Actions exporter stopped");
    Ok(())
}
