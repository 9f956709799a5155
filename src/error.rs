//! Error types.
//!
//! Every failure the engine can observe is recovered locally except
//! [`DashboardError::TotalSourceFailure`], which is the only error a
//! dashboard consumer ever sees.

use std::time::Duration;
use thiserror::Error;

/// Failures talking to the remote LMS web service.
#[derive(Debug, Error)]
pub enum LmsError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("cannot connect to LMS at {0}")]
    Connect(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("LMS returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LMS exception {errorcode}: {message}")]
    Remote { errorcode: String, message: String },

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl LmsError {
    /// Convert a reqwest error into the matching transport variant.
    pub fn from_reqwest(err: reqwest::Error, endpoint: &str, timeout: Duration) -> Self {
        if err.is_timeout() {
            LmsError::Timeout(timeout)
        } else if err.is_connect() {
            LmsError::Connect(endpoint.to_string())
        } else if err.is_decode() {
            LmsError::MalformedPayload(err.to_string())
        } else {
            LmsError::Transport(err.to_string())
        }
    }
}

/// Failures of the durable key-value medium. Never escapes the TTL cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache store lock poisoned")]
    Poisoned,
}

/// Failure to synthesize substitute data for a source.
#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("no fallback configured for source '{0}'")]
    Missing(String),

    #[error("fallback for source '{key}' failed: {reason}")]
    Synthesis { key: String, reason: String },
}

/// Errors surfaced to dashboard consumers.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Raised as soon as any one source has neither real nor synthetic
    /// data, not only when every source is down. `sources` lists exactly
    /// the unusable ones; the request can be retried.
    #[error("no usable data for sources: {}", .sources.join(", "))]
    TotalSourceFailure { sources: Vec<String> },
}

/// A role name that does not parse as a canonical role.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);
