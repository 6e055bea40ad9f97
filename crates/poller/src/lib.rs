//! Polling orchestration for the GitHub Actions exporter.
//!
//! Sequences calls between the [`runs`] domain (tracker, revalidation policy,
//! metric surface) and the run/quota ports, and owns every long-running task:
//!
//! - [`PollScheduler`]: one loop per repository: list each incomplete status,
//!   then the completed runs since the oldest tracked run's hour, then sleep.
//! - [`RateWatcher`]: one loop sampling the remaining API quota.
//! - [`Supervisor`]: spawns the loops, fans out shutdown, and keeps a
//!   per-repository [`HealthRegistry`].
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** No tracking rules live here and no HTTP either;
//! both are reached only through the [`runs`] crate's types and traits.

pub mod config;
pub mod fetch;
pub mod health;
pub mod rate_watcher;
pub mod scheduler;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use config::PollerConfig;
pub use fetch::fetch_all_runs;
pub use health::{CycleReport, HealthRegistry, RepositoryHealth};
pub use rate_watcher::RateWatcher;
pub use scheduler::PollScheduler;
pub use supervisor::{ShutdownHandle, Supervisor};
