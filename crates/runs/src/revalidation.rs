//! Cache revalidation for a single paginated listing call.
//!
//! The first page of every call is requested with forced revalidation, because
//! it holds the most recent runs and is the page most likely to have changed.
//! If the origin confirms that first page unchanged, the remaining pages of the
//! same call fall back to ordinary expiry-based caching. Anything else keeps
//! forcing revalidation for every page. A new call starts over.

use crate::{CacheDirective, CacheStatus};

/// Per-call revalidation state. Create one per top-level listing call.
#[derive(Debug, Clone)]
pub struct RevalidationPolicy {
    directive: CacheDirective,
    first_response_seen: bool,
}

impl RevalidationPolicy {
    pub fn new() -> Self {
        Self {
            directive: CacheDirective::ForceRevalidate,
            first_response_seen: false,
        }
    }

    /// The directive to attach to the next request of this call.
    pub fn directive(&self) -> CacheDirective {
        self.directive
    }

    /// Feeds back what the cache reported for a response of this call.
    ///
    /// Only the first response can relax the directive; later responses
    /// leave it as decided.
    pub fn record(&mut self, status: CacheStatus) {
        if self.first_response_seen {
            return;
        }
        self.first_response_seen = true;
        if status.is_validated() {
            self.directive = CacheDirective::Default;
        }
    }
}

impl Default for RevalidationPolicy {
    fn default() -> Self {
        Self::new()
    }
}
