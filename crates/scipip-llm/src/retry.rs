//! Timeout-only retry for chat completion calls.
//!
//! [`RetryPolicy`] wraps any [`Provider`] and re-sends a request whose
//! attempt hit its connect or read timeout. Every other error surfaces
//! immediately. When the last attempt also times out the caller receives
//! [`ProviderError::RetriesExhausted`] carrying the attempt count, the
//! per-attempt timeout, and the final error as its source.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::error::{ProviderError, Result};
use crate::provider::Provider;
use crate::types::{ChatRequest, ChatResponse};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Additional attempts after the first (default: 2, so 3 in total).
    pub max_retries: u32,
    /// Pause between attempts (default: none; the attempt timeout is the wait).
    pub delay: Duration,
    /// Timeout reported for requests that carry no explicit timeout.
    pub default_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::ZERO,
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl RetryConfig {
    /// Total number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Determines whether an error should be retried: only timeouts are.
pub fn is_retryable(err: &ProviderError) -> bool {
    matches!(err, ProviderError::Timeout(_))
}

/// A provider wrapper that retries timed-out attempts.
///
/// ```rust,ignore
/// let provider = RetryPolicy::new(OpenAiCompatProvider::new(settings), RetryConfig::default());
/// // Up to three attempts; timeouts on all three yield RetriesExhausted.
/// ```
pub struct RetryPolicy<P> {
    inner: P,
    config: RetryConfig,
}

impl<P: Provider> RetryPolicy<P> {
    pub fn new(inner: P, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn exhausted(&self, request: &ChatRequest, last: ProviderError) -> ProviderError {
        let timeout = request.timeout.unwrap_or(self.config.default_timeout);
        ProviderError::RetriesExhausted {
            attempts: self.config.max_attempts(),
            timeout_secs: timeout.as_secs_f64(),
            source: Box::new(last),
        }
    }

    /// Decide what to do after a failed attempt. `Ok(())` means try again.
    async fn after_failure(
        &self,
        request: &ChatRequest,
        attempt: u32,
        err: ProviderError,
    ) -> Result<()> {
        if !is_retryable(&err) {
            return Err(err);
        }
        if attempt + 1 >= self.config.max_attempts() {
            warn!(
                provider = %self.inner.name(),
                attempts = self.config.max_attempts(),
                error = %err,
                "request timed out on every attempt"
            );
            return Err(self.exhausted(request, err));
        }

        warn!(
            provider = %self.inner.name(),
            attempt = attempt + 1,
            max_attempts = self.config.max_attempts(),
            error = %err,
            "request timed out, retrying"
        );
        if !self.config.delay.is_zero() {
            tokio::time::sleep(self.config.delay).await;
        }
        Ok(())
    }
}

#[async_trait]
impl<P: Provider> Provider for RetryPolicy<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(request).await {
                Ok(response) => {
                    if attempt > 0 {
                        debug!(provider = %self.inner.name(), attempt, "request succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(err) => self.after_failure(request, attempt, err).await?,
            }
            attempt += 1;
        }
    }

    async fn complete_stream(
        &self,
        request: &ChatRequest,
        tx: mpsc::Sender<String>,
    ) -> Result<String> {
        // A retried stream restarts from scratch; deltas already forwarded
        // by a timed-out attempt are not retracted.
        let mut attempt = 0;
        loop {
            match self.inner.complete_stream(request, tx.clone()).await {
                Ok(text) => {
                    if attempt > 0 {
                        debug!(provider = %self.inner.name(), attempt, "streaming request succeeded after retry");
                    }
                    return Ok(text);
                }
                Err(err) => self.after_failure(request, attempt, err).await?,
            }
            attempt += 1;
        }
    }
}

impl<P: std::fmt::Debug> std::fmt::Debug for RetryPolicy<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("inner", &self.inner)
            .field("config", &self.config)
            .finish()
    }
}
