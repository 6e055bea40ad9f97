//! Settings shared by every polling loop.

use std::time::Duration;

/// Polling configuration passed into each loop's constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    interval: Duration,
}

impl PollerConfig {
    /// Creates a configuration sleeping `interval_secs` between cycles.
    ///
    /// Returns `None` for a zero interval.
    pub fn from_secs(interval_secs: u64) -> Option<Self> {
        (interval_secs > 0).then(|| Self {
            interval: Duration::from_secs(interval_secs),
        })
    }

    /// Sleep between two cycles of one loop.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_is_rejected() {
        assert!(PollerConfig::from_secs(0).is_none());
        assert_eq!(
            PollerConfig::from_secs(15).unwrap().interval(),
            Duration::from_secs(15)
        );
        assert_eq!(PollerConfig::default().interval(), Duration::from_secs(30));
    }
}
