//! OpenAI-compatible provider implementation.
//!
//! [`OpenAiCompatProvider`] sends one POST per attempt to the chat
//! completions endpoint derived from [`LlmSettings::base_url`], applying the
//! request's timeout (or the settings default) to connect and read.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::config::LlmSettings;
use crate::error::{ProviderError, Result};
use crate::provider::Provider;
use crate::sse::SseAccumulator;
use crate::types::{ChatRequest, ChatResponse};

/// Chat completion provider for any OpenAI-compatible endpoint.
pub struct OpenAiCompatProvider {
    settings: LlmSettings,
    http: reqwest::Client,
    api_key: Option<String>,
}

impl OpenAiCompatProvider {
    /// Create a provider; the API key is read from `settings.api_key_env`
    /// at request time.
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
            api_key: None,
        }
    }

    /// Create a provider with an explicit API key.
    pub fn with_api_key(settings: LlmSettings, api_key: String) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
            api_key: Some(api_key),
        }
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    fn completions_url(&self) -> String {
        self.settings.completions_url()
    }

    /// Per-attempt timeout for `request`.
    pub fn effective_timeout(&self, request: &ChatRequest) -> Duration {
        request.timeout.unwrap_or_else(|| self.settings.timeout())
    }

    /// Resolve the API key: explicit key > environment variable. Local
    /// models may run without one.
    fn resolve_api_key(&self) -> Result<Option<String>> {
        if let Some(ref key) = self.api_key {
            return Ok(Some(key.clone()));
        }
        match std::env::var(&self.settings.api_key_env) {
            Ok(key) if !key.is_empty() => Ok(Some(key)),
            _ if !self.settings.requires_api_key() => Ok(None),
            _ => Err(ProviderError::NotConfigured(format!(
                "set {} env var",
                self.settings.api_key_env
            ))),
        }
    }

    /// Send the request and map non-success statuses to errors.
    async fn send(&self, request: &ChatRequest) -> Result<reqwest::Response> {
        let api_key = self.resolve_api_key()?;
        let url = self.completions_url();
        let timeout = self.effective_timeout(request);

        debug!(
            provider = %self.settings.name,
            model = %request.model,
            messages = request.messages.len(),
            stream = request.is_streaming(),
            timeout_secs = timeout.as_secs(),
            "sending chat completion request"
        );

        let mut req = self
            .http
            .post(&url)
            .timeout(timeout)
            .header("Content-Type", "application/json");

        if let Some(key) = api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        if request.is_streaming() {
            req = req.header("Accept", "text/event-stream");
        }
        for (k, v) in self.settings.headers.iter().chain(&request.extra_headers) {
            req = req.header(k.as_str(), v.as_str());
        }

        let response = req
            .json(request)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        if status.as_u16() == 429 {
            let header_ms = parse_retry_after_header(&response);
            let body = response.text().await.unwrap_or_default();
            let retry_ms = header_ms
                .or_else(|| parse_retry_after_ms(&body))
                .unwrap_or(1000);
            warn!(
                provider = %self.settings.name,
                retry_after_ms = retry_ms,
                "rate limited"
            );
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry_ms,
            });
        }

        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 | 403 => Err(ProviderError::AuthFailed(body)),
            404 => Err(ProviderError::ModelNotFound(format!(
                "model '{}': {}",
                request.model, body
            ))),
            _ => Err(ProviderError::RequestFailed(format!(
                "HTTP {status}: {body}"
            ))),
        }
    }

    /// Drain an SSE response, forwarding deltas to `tx` when given.
    async fn read_stream(
        &self,
        response: reqwest::Response,
        tx: Option<&mpsc::Sender<String>>,
    ) -> Result<String> {
        let mut byte_stream = response.bytes_stream();
        let mut acc = SseAccumulator::new();
        let mut forward = tx;

        while let Some(chunk) = byte_stream.next().await {
            let bytes = chunk.map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::RequestFailed(format!("stream read error: {e}"))
                }
            })?;

            for delta in acc.push(&bytes) {
                trace!(provider = %self.settings.name, delta = %delta, "streaming delta");
                if let Some(sink) = forward
                    && sink.send(delta).await.is_err()
                {
                    debug!(provider = %self.settings.name, "delta receiver dropped");
                    forward = None;
                }
            }
            if acc.is_done() {
                break;
            }
        }

        if let Some(delta) = acc.finish()
            && let Some(sink) = forward
        {
            let _ = sink.send(delta).await;
        }

        debug!(
            provider = %self.settings.name,
            chars = acc.text().len(),
            "streaming complete"
        );
        Ok(acc.into_text())
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.settings.name
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self.send(request).await?;

        if request.is_streaming() {
            let text = self.read_stream(response, None).await?;
            return Ok(ChatResponse::from_text(text));
        }

        let body = response.bytes().await.map_err(ProviderError::from_reqwest)?;
        let chat_response: ChatResponse = serde_json::from_slice(&body).map_err(|e| {
            ProviderError::InvalidResponse(format!("failed to parse response: {e}"))
        })?;

        debug!(
            provider = %self.settings.name,
            choices = chat_response.choices.len(),
            "chat completion response received"
        );
        Ok(chat_response)
    }

    async fn complete_stream(
        &self,
        request: &ChatRequest,
        tx: mpsc::Sender<String>,
    ) -> Result<String> {
        let mut stream_request = request.clone();
        stream_request.stream = Some(true);
        let response = self.send(&stream_request).await?;
        self.read_stream(response, Some(&tx)).await
    }
}

/// Try to extract a retry-after value (seconds) from the HTTP headers.
fn parse_retry_after_header(response: &reqwest::Response) -> Option<u64> {
    let header_val = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())?;
    header_val
        .parse::<f64>()
        .ok()
        .map(|secs| (secs * 1000.0).max(0.0) as u64)
}

/// Try to extract a retry-after value from a JSON error body.
fn parse_retry_after_ms(body: &str) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("retry_after_ms")
        .and_then(|v| v.as_u64())
        .or_else(|| {
            value
                .get("retry_after")
                .and_then(|v| v.as_f64())
                .map(|secs| (secs * 1000.0) as u64)
        })
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("name", &self.settings.name)
            .field("base_url", &self.settings.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}
