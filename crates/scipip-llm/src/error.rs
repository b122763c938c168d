//! Provider error types for scipip-llm.
//!
//! All provider operations return [`Result<T>`] which uses [`ProviderError`]
//! as the error type.

use thiserror::Error;

/// Errors that can occur when talking to the chat completion endpoint.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The HTTP request failed for a reason other than a timeout.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Authentication with the endpoint was rejected (HTTP 401/403).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The endpoint returned a rate-limit response (HTTP 429).
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested wait time before retrying, in milliseconds.
        retry_after_ms: u64,
    },

    /// The requested model does not exist on the endpoint.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The client has not been configured (e.g. missing API key).
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// The endpoint returned a response that could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A single attempt hit its connect or read timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Every attempt timed out. Carries the last attempt's error.
    #[error(
        "request timed out after {attempts} attempts (timeout: {timeout_secs}s per attempt): {source}"
    )]
    RetriesExhausted {
        /// Total number of attempts made.
        attempts: u32,
        /// Per-attempt timeout in seconds, fractional below one second.
        timeout_secs: f64,
        /// The error produced by the final attempt.
        #[source]
        source: Box<ProviderError>,
    },

    /// An HTTP-level error from reqwest that is not a timeout.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    /// Classify a reqwest error, separating timeouts from everything else.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Http(err)
        }
    }

    /// Whether this error is a timeout (single attempt or exhausted).
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::RetriesExhausted { .. })
    }
}

/// A convenience type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
