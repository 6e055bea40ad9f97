//! In-memory HTTP response cache keyed by URL.
//!
//! Entries hold the response body, its `ETag`, its `rel="next"` link and a
//! freshness deadline derived from `Cache-Control: max-age`. Revalidated
//! entries answered with `304 Not Modified` do not count against the GitHub
//! request quota, which is what makes polling every few seconds affordable.
//!
//! One cache is shared by every client in the process; it is internally
//! synchronised and cheap to clone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Default maximum number of cached responses.
pub const DEFAULT_CAPACITY: usize = 4096;

/// One cached response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub etag: String,
    pub body: String,
    /// `rel="next"` link of the cached page.
    pub next: Option<String>,
    pub fresh_until: Instant,
    stored_at: Instant,
}

impl CachedResponse {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.fresh_until
    }
}

/// Shared response cache with a fixed entry cap.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    entries: Arc<Mutex<HashMap<String, CachedResponse>>>,
    capacity: usize,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A cache that evicts the least recently stored entry once `capacity`
    /// entries are held. A capacity of zero disables storage.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            capacity,
        }
    }

    pub fn get(&self, url: &str) -> Option<CachedResponse> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    /// Stores a fresh `200` response.
    pub fn store(
        &self,
        url: &str,
        etag: String,
        body: String,
        next: Option<String>,
        max_age: Duration,
    ) {
        if self.capacity == 0 {
            return;
        }

        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if entries.len() >= self.capacity && !entries.contains_key(url) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            url.to_string(),
            CachedResponse {
                etag,
                body,
                next,
                fresh_until: now + max_age,
                stored_at: now,
            },
        );
    }

    /// Extends an entry's freshness after the origin confirmed it with `304`.
    /// Returns the refreshed entry.
    pub fn revalidated(&self, url: &str, max_age: Duration) -> Option<CachedResponse> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get_mut(url)?;
        entry.fresh_until = now + max_age;
        entry.stored_at = now;
        Some(entry.clone())
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts `max-age` from a `Cache-Control` header value.
///
/// `no-store`/`no-cache` and a missing directive yield zero, so the entry
/// is revalidated on every use.
pub fn parse_max_age(cache_control: Option<&str>) -> Duration {
    let Some(value) = cache_control else {
        return Duration::ZERO;
    };

    let mut max_age = Duration::ZERO;
    for directive in value.split(',').map(str::trim) {
        let lower = directive.to_ascii_lowercase();
        if lower == "no-store" || lower == "no-cache" {
            return Duration::ZERO;
        }
        if let Some(secs) = lower.strip_prefix("max-age=") {
            if let Ok(secs) = secs.trim_matches('"').parse::<u64>() {
                max_age = Duration::from_secs(secs);
            }
        }
    }
    max_age
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_age_is_read_from_github_header() {
        assert_eq!(
            parse_max_age(Some("private, max-age=60, s-maxage=60")),
            Duration::from_secs(60)
        );
        assert_eq!(parse_max_age(Some("no-cache")), Duration::ZERO);
        assert_eq!(parse_max_age(Some("private, max-age=60, no-store")), Duration::ZERO);
        assert_eq!(parse_max_age(None), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_max_age() {
        let cache = ResponseCache::new();
        cache.store("u", "\"e\"".to_string(), "{}".to_string(), None, Duration::from_secs(60));
        assert!(cache.get("u").unwrap().is_fresh(Instant::now()));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!cache.get("u").unwrap().is_fresh(Instant::now()));

        let refreshed = cache.revalidated("u", Duration::from_secs(60)).unwrap();
        assert!(refreshed.is_fresh(Instant::now()));
        assert!(cache.revalidated("missing", Duration::from_secs(60)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_least_recently_stored() {
        let cache = ResponseCache::with_capacity(2);
        cache.store("a", "1".to_string(), String::new(), None, Duration::ZERO);
        tokio::time::advance(Duration::from_millis(1)).await;
        cache.store("b", "2".to_string(), String::new(), None, Duration::ZERO);
        tokio::time::advance(Duration::from_millis(1)).await;
        cache.store("c", "3".to_string(), String::new(), None, Duration::ZERO);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let cache = ResponseCache::with_capacity(0);
        cache.store("a", "1".to_string(), String::new(), None, Duration::ZERO);
        assert!(cache.is_empty());
    }
}
