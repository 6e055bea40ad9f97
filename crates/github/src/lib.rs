//! GitHub REST adapter for the exporter.
//!
//! Implements the ports defined in the [`runs`] crate
//! ([`runs::WorkflowRunSource`], [`runs::RepositoryDirectory`],
//! [`runs::RateLimitSource`]) with a single [`GitHubClient`] built on
//! `reqwest`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain tracking rules.
//! Every GitHub API detail (authentication, pagination, conditional requests,
//! rate-limit responses) is handled here; the [`runs`] crate never sees them.
//!
//! ## Conditional requests
//!
//! Responses carrying an `ETag` are kept in a [`ResponseCache`] and replayed
//! with `If-None-Match`. A `304 Not Modified` answer costs no request quota,
//! which is what makes polling every repository every few seconds possible.
//! Callers steer the cache per request with [`runs::CacheDirective`] and learn
//! what happened through [`runs::CacheStatus`].

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
mod models;
pub mod pagination;

pub use auth::{AppCredentials, Credentials};
pub use cache::ResponseCache;
pub use client::GitHubClient;
pub use config::{ClientConfig, DEFAULT_API_BASE_URL};
pub use error::GitHubError;
