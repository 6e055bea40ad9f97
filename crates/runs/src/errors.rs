//! Errors surfaced by the port traits in [`crate::source`].
//!
//! Every variant is a transient fetch failure from the point of view of a
//! polling loop: it is logged, the current fetch step is skipped and the loop
//! carries on with its next step or cycle. Infrastructure crates convert their
//! own error types into [`SourceError`] at the port boundary.

use thiserror::Error;

use crate::Timestamp;

/// A failed call to one of the GitHub-facing ports.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The request never produced an HTTP response (DNS, TLS, timeout, ...).
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the underlying transport failure.
        message: String,
    },

    /// The API answered with a non-success status.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The API quota is exhausted.
    #[error("Rate limited until {}", reset_at.map_or_else(|| "unknown".to_string(), |t| t.to_string()))]
    RateLimited {
        /// When the quota resets, if the API said so.
        reset_at: Option<Timestamp>,
    },

    /// The response body could not be decoded into domain types.
    #[error("Could not decode response: {message}")]
    Decode {
        /// Description of the decoding problem.
        message: String,
    },

    /// Credentials could not be produced or were rejected.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Description of the authentication problem.
        message: String,
    },
}
