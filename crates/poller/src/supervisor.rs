//! Spawns and watches every polling task.
//!
//! One task per repository plus one rate-limit watcher, all sharing a single
//! shutdown signal. A task that panics is logged and marked stopped in the
//! [`HealthRegistry`]; the other tasks keep running.

use std::collections::HashMap;
use std::sync::Arc;

use runs::RepositoryName;
use tokio::sync::watch;
use tokio::task::{Id, JoinSet};
use tracing::{error, info};

use crate::health::HealthRegistry;
use crate::rate_watcher::RateWatcher;
use crate::scheduler::PollScheduler;

#[derive(Debug, Clone)]
enum Worker {
    Repository(RepositoryName),
    RateWatcher,
}

impl std::fmt::Display for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Worker::Repository(repository) => write!(f, "poller for {repository}"),
            Worker::RateWatcher => f.write_str("rate limit watcher"),
        }
    }
}

/// Cloneable trigger for the supervisor's shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    /// Asks every worker to stop at its next sleep.
    pub fn trigger(&self) {
        // Only fails when every receiver is gone, i.e. nothing is left to stop.
        let _ = self.0.send(true);
    }
}

pub struct Supervisor {
    tasks: JoinSet<()>,
    workers: HashMap<Id, Worker>,
    shutdown: ShutdownHandle,
    shutdown_rx: watch::Receiver<bool>,
    health: HealthRegistry,
}

impl Supervisor {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            tasks: JoinSet::new(),
            workers: HashMap::new(),
            shutdown: ShutdownHandle(Arc::new(shutdown_tx)),
            shutdown_rx,
            health: HealthRegistry::new(),
        }
    }

    /// Shared handle to per-repository health; stays valid after [`join`](Self::join).
    pub fn health(&self) -> HealthRegistry {
        self.health.clone()
    }

    /// Number of workers spawned so far.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn spawn_repository(&mut self, scheduler: PollScheduler) {
        let repository = scheduler.repository().clone();
        self.health.worker_started(&repository);
        let handle = self
            .tasks
            .spawn(scheduler.run(self.shutdown_rx.clone(), self.health.clone()));
        self.workers
            .insert(handle.id(), Worker::Repository(repository));
    }

    pub fn spawn_rate_watcher(&mut self, watcher: RateWatcher) {
        let handle = self.tasks.spawn(watcher.run(self.shutdown_rx.clone()));
        self.workers.insert(handle.id(), Worker::RateWatcher);
    }

    /// A handle that stops every worker, usable after [`join`](Self::join)
    /// has taken ownership of the supervisor.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Waits until every worker has exited.
    pub async fn join(mut self) {
        while let Some(result) = self.tasks.join_next_with_id().await {
            match result {
                Ok((id, ())) => {
                    if let Some(worker) = self.workers.get(&id) {
                        info!(%worker, "worker exited");
                    }
                }
                Err(e) => {
                    let worker = self.workers.get(&e.id()).cloned();
                    if let Some(Worker::Repository(repository)) = &worker {
                        self.health.worker_stopped(repository);
                    }
                    let worker = worker
                        .map_or_else(|| "unknown worker".to_string(), |w| w.to_string());
                    error!(%worker, error = %e, "worker terminated abnormally");
                }
            }
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}
