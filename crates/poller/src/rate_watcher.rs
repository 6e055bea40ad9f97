//! Periodic sampling of the remaining API quota.

use std::sync::Arc;
use std::time::Duration;

use runs::{MetricSurface, RateLimitSource, SourceError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Samples the remaining quota into the rate-limit gauge every interval.
pub struct RateWatcher {
    source: Arc<dyn RateLimitSource>,
    metrics: MetricSurface,
    interval: Duration,
}

impl RateWatcher {
    pub fn new(source: Arc<dyn RateLimitSource>, metrics: MetricSurface, interval: Duration) -> Self {
        Self {
            source,
            metrics,
            interval,
        }
    }

    /// Takes one sample and publishes it. The gauge keeps its previous value
    /// on failure.
    pub async fn sample(&self) -> Result<u64, SourceError> {
        let remaining = self.source.remaining().await?;
        self.metrics.set_rate_limit_remaining(remaining);
        debug!(remaining, "sampled API rate limit");
        Ok(remaining)
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "rate limit watcher started");

        while !*shutdown.borrow() {
            if let Err(e) = self.sample().await {
                warn!(error = %e, "rate limit sample failed");
            }

            debug!(interval_secs = self.interval.as_secs(), "sleeping");
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("rate limit watcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use prometheus::Registry;

    use super::*;

    struct ScriptedQuota(Mutex<VecDeque<Result<u64, SourceError>>>);

    #[async_trait]
    impl RateLimitSource for ScriptedQuota {
        async fn remaining(&self) -> Result<u64, SourceError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(0))
        }
    }

    fn watcher(samples: Vec<Result<u64, SourceError>>) -> (RateWatcher, MetricSurface) {
        let metrics = MetricSurface::new(&Registry::new()).unwrap();
        let source = Arc::new(ScriptedQuota(Mutex::new(samples.into())));
        (
            RateWatcher::new(source, metrics.clone(), Duration::from_secs(30)),
            metrics,
        )
    }

    #[tokio::test]
    async fn failed_sample_keeps_previous_value() {
        let (watcher, metrics) = watcher(vec![
            Ok(4999),
            Err(SourceError::Transport {
                message: "connection reset".to_string(),
            }),
        ]);

        assert_eq!(watcher.sample().await.unwrap(), 4999);
        assert!(watcher.sample().await.is_err());
        assert_eq!(metrics.rate_limit_remaining(), 4999);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_keeps_sampling_after_errors() {
        let (watcher, metrics) = watcher(vec![
            Err(SourceError::RateLimited { reset_at: None }),
            Ok(4000),
            Ok(3990),
        ]);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(watcher.run(shutdown_rx));

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(metrics.rate_limit_remaining(), 4000);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(metrics.rate_limit_remaining(), 3990);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
