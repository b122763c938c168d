//! High-level completion client.
//!
//! [`LlmClient`] binds a [`Provider`] to a model name and a set of default
//! [`CompletionOptions`], and exposes the one operation the rest of scipip
//! needs: turn a message list into text.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::config::LlmSettings;
use crate::error::Result;
use crate::openai_compat::OpenAiCompatProvider;
use crate::provider::Provider;
use crate::retry::{RetryConfig, RetryPolicy};
use crate::types::{ChatMessage, ChatRequest, CompletionOptions};

/// Something that turns a conversation into completion text.
///
/// Pipeline capabilities depend on this trait rather than on [`LlmClient`]
/// so they can be exercised against scripted completions in tests.
#[async_trait]
pub trait Completion: Send + Sync {
    /// Complete `messages` and return the assistant text (empty when the
    /// endpoint returned no content).
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: &CompletionOptions,
    ) -> Result<String>;
}

#[async_trait]
impl<T: Completion + ?Sized> Completion for Arc<T> {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: &CompletionOptions,
    ) -> Result<String> {
        (**self).complete(messages, options).await
    }
}

/// Chat completion client with timeout retries.
pub struct LlmClient {
    provider: Arc<dyn Provider>,
    model: String,
    defaults: CompletionOptions,
}

impl LlmClient {
    /// Build a client for the endpoint described by `settings`.
    ///
    /// Requests go through [`RetryPolicy`] with the default budget of three
    /// attempts.
    pub fn new(settings: LlmSettings) -> Self {
        let retry = RetryConfig {
            default_timeout: settings.timeout(),
            ..RetryConfig::default()
        };
        let model = settings.model.clone();
        let defaults = settings.default_options();
        let provider = RetryPolicy::new(OpenAiCompatProvider::new(settings), retry);
        Self::with_provider(Arc::new(provider), model, defaults)
    }

    /// Build a client over an arbitrary provider.
    pub fn with_provider(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        defaults: CompletionOptions,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            defaults,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn defaults(&self) -> &CompletionOptions {
        &self.defaults
    }

    fn request(&self, messages: Vec<ChatMessage>, options: &CompletionOptions) -> ChatRequest {
        let options = options.clone().or(&self.defaults);
        ChatRequest::with_options(self.model.clone(), messages, options)
    }

    /// Complete `messages` as a delta stream, forwarding each text fragment
    /// to `sink` and returning the accumulated text.
    ///
    /// A dropped receiver does not cancel the call; the text is still
    /// accumulated and returned.
    #[instrument(skip_all, fields(provider = %self.provider.name(), model = %self.model))]
    pub async fn complete_streaming(
        &self,
        messages: Vec<ChatMessage>,
        options: &CompletionOptions,
        sink: mpsc::Sender<String>,
    ) -> Result<String> {
        let request = self.request(messages, &options.clone().streaming());
        let text = self.provider.complete_stream(&request, sink).await?;
        debug!(chars = text.len(), "streamed completion finished");
        Ok(text)
    }
}

#[async_trait]
impl Completion for LlmClient {
    #[instrument(skip_all, fields(provider = %self.provider.name(), model = %self.model))]
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: &CompletionOptions,
    ) -> Result<String> {
        let request = self.request(messages, options);
        let response = self.provider.complete(&request).await?;
        let text = response.first_content();
        debug!(chars = text.len(), "completion finished");
        Ok(text)
    }
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}
