//! Workflow-run domain for the GitHub Actions exporter.
//!
//! This crate holds every domain concept, newtype identifier and port trait
//! used by the exporter, together with the two pieces of pure logic everything
//! else hangs off: the [`RunStateTracker`] and the [`RevalidationPolicy`].
//! Infrastructure crates implement the ports defined here; they never add
//! tracking rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is fetched and *how observations become metrics*; the
//! `github` crate defines how to talk to the API and the `poller` crate
//! decides when.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`RunId`, `RepositoryName`, `WorkflowName`) |
//! | [`types`] | Value types (`Timestamp`, `RunStatus`, `WorkflowRun`, `Account`) |
//! | [`errors`] | [`SourceError`], the error every port returns |
//! | [`source`] | Port traits and cache-control vocabulary |
//! | [`revalidation`] | Per-call forced-revalidation policy |
//! | [`metrics`] | The Prometheus collectors published by the exporter |
//! | [`tracker`] | Incomplete-run tracking and duration observation |

pub mod errors;
pub mod identifiers;
pub mod metrics;
pub mod revalidation;
pub mod source;
pub mod tracker;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::SourceError;
pub use identifiers::{RepositoryName, RunId, WorkflowName};
pub use metrics::MetricSurface;
pub use revalidation::RevalidationPolicy;
pub use source::{
    CacheDirective, CacheStatus, PageCursor, RateLimitSource, RepositoryDirectory, RunPage,
    RunQuery, WorkflowRunSource,
};
pub use tracker::{Observation, RunStateTracker};
pub use types::{Account, RunStatus, Timestamp, WorkflowRun};
