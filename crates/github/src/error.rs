//! GitHub adapter error types.

use std::path::PathBuf;

use runs::{SourceError, Timestamp};
use thiserror::Error;

/// Errors that can occur while talking to the GitHub REST API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GitHubError {
    /// The HTTP request failed before a response arrived, or the body could
    /// not be read.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// GitHub answered with a non-success status.
    #[error("GitHub API returned {status}: {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The response body, or the reason phrase when the body is empty.
        message: String,
    },

    /// The request quota is exhausted (primary or secondary rate limit).
    #[error("GitHub rate limit exhausted")]
    RateLimited {
        /// When the quota resets, from `x-ratelimit-reset`.
        reset_at: Option<Timestamp>,
    },

    /// The response body did not match the expected shape.
    #[error("failed to decode GitHub response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A decoded value violates a domain invariant (e.g. empty repository name).
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// GitHub answered `304 Not Modified` to a request the cache did not
    /// make conditional.
    #[error("received 304 Not Modified for {url} without a cached entry")]
    UnexpectedNotModified {
        /// The requested URL.
        url: String,
    },

    /// The GitHub App private key could not be read.
    #[error("failed to read private key {}: {source}", path.display())]
    PrivateKey {
        /// Path of the PEM file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The GitHub App JWT could not be signed.
    #[error("failed to sign GitHub App JWT: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// A configuration value is unusable.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// The configuration field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl From<GitHubError> for SourceError {
    fn from(value: GitHubError) -> Self {
        match value {
            GitHubError::Transport(e) => SourceError::Transport {
                message: e.to_string(),
            },
            GitHubError::Api { status, message } => SourceError::Api { status, message },
            GitHubError::RateLimited { reset_at } => SourceError::RateLimited { reset_at },
            GitHubError::Decode(e) => SourceError::Decode {
                message: e.to_string(),
            },
            e @ (GitHubError::InvalidValue { .. } | GitHubError::UnexpectedNotModified { .. }) => {
                SourceError::Decode {
                    message: e.to_string(),
                }
            }
            e @ (GitHubError::PrivateKey { .. }
            | GitHubError::Jwt(_)
            | GitHubError::InvalidConfig { .. }) => SourceError::Authentication {
                message: e.to_string(),
            },
        }
    }
}
