//! Resilient chat completion client for scipip.
//!
//! Talks to a single OpenAI-compatible endpoint and hides the unreliable
//! parts of that conversation: per-attempt timeouts, timeout-only retries,
//! and incremental (SSE delta) responses that are accumulated into text.
//!
//! # Architecture
//!
//! - [`Provider`] executes one chat completion request (buffered or streamed)
//! - [`OpenAiCompatProvider`] implements it over HTTP with `reqwest`
//! - [`RetryPolicy`] wraps any provider and retries timed-out attempts
//! - [`LlmClient`] ties the three together behind the [`Completion`] trait
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use scipip_llm::{ChatMessage, Completion, CompletionOptions, LlmClient, LlmSettings};
//!
//! let client = LlmClient::new(LlmSettings::default())?;
//! let text = client
//!     .complete(
//!         vec![ChatMessage::user("Name three open problems in protein folding.")],
//!         &CompletionOptions::default(),
//!     )
//!     .await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod openai_compat;
pub mod provider;
pub mod retry;
pub mod sse;
pub mod types;

pub use client::{Completion, LlmClient};
pub use config::{DEFAULT_TIMEOUT_SECS, LlmSettings, completions_endpoint};
pub use error::{ProviderError, Result};
pub use openai_compat::OpenAiCompatProvider;
pub use provider::Provider;
pub use retry::{RetryConfig, RetryPolicy};
pub use sse::{SseAccumulator, SseLine, parse_sse_line};
pub use types::{ChatMessage, ChatRequest, ChatResponse, CompletionOptions};
