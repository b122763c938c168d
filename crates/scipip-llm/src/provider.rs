//! The core [`Provider`] trait for chat completions.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::types::{ChatRequest, ChatResponse};

/// Something that can execute a chat completion request.
///
/// [`OpenAiCompatProvider`](crate::openai_compat::OpenAiCompatProvider) is
/// the HTTP implementation; [`RetryPolicy`](crate::retry::RetryPolicy) wraps
/// any provider with timeout retries. Tests implement the trait directly.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns the provider name used in logs.
    fn name(&self) -> &str;

    /// Execute a request and return the full response.
    ///
    /// When `request.stream` is set the provider reads the SSE delta stream
    /// and returns the accumulated text as a single-choice response.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Execute a request as a delta stream, forwarding each text delta to
    /// `tx` and returning the accumulated text.
    ///
    /// The default implementation performs a buffered call and forwards the
    /// whole content as one delta.
    async fn complete_stream(
        &self,
        request: &ChatRequest,
        tx: mpsc::Sender<String>,
    ) -> Result<String> {
        let text = self.complete(request).await?.first_content();
        let _ = tx.send(text.clone()).await;
        Ok(text)
    }
}
