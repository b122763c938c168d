//! Request and response types for chat completion calls.
//!
//! These mirror the OpenAI chat completion format. Response types are
//! deliberately lenient: missing `choices`, `message`, or `content` fields
//! deserialize to empty values instead of failing.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// The role of the message author ("system", "user", "assistant", "tool").
    pub role: String,

    /// The content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Create a simple message with role and content.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Per-call knobs for a completion. Unset fields are omitted from the payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub seed: Option<i64>,
    pub stop: Option<Vec<String>>,
    /// Tool declarations, passed through verbatim.
    pub tools: Vec<serde_json::Value>,
    pub tool_choice: Option<String>,
    /// Read the response as an SSE delta stream instead of one JSON body.
    /// `Some(false)` opts out of a streaming default.
    pub stream: Option<bool>,
    /// Overrides the client's default per-attempt timeout.
    pub timeout: Option<Duration>,
    pub extra_headers: HashMap<String, String>,
    /// Merged into the top level of the JSON payload.
    pub extra_body: serde_json::Map<String, serde_json::Value>,
}

impl CompletionOptions {
    /// Options with the given sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Options that request an incremental (SSE) response.
    pub fn streaming(mut self) -> Self {
        self.stream = Some(true);
        self
    }

    /// Options that request one buffered JSON body.
    pub fn buffered(mut self) -> Self {
        self.stream = Some(false);
        self
    }

    /// Options with a per-call timeout override.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fill every unset field from `defaults`.
    pub fn or(mut self, defaults: &CompletionOptions) -> Self {
        self.temperature = self.temperature.or(defaults.temperature);
        self.top_p = self.top_p.or(defaults.top_p);
        self.max_tokens = self.max_tokens.or(defaults.max_tokens);
        self.seed = self.seed.or(defaults.seed);
        if self.stop.is_none() {
            self.stop = defaults.stop.clone();
        }
        if self.tools.is_empty() {
            self.tools = defaults.tools.clone();
        }
        if self.tool_choice.is_none() {
            self.tool_choice = defaults.tool_choice.clone();
        }
        self.stream = self.stream.or(defaults.stream);
        self.timeout = self.timeout.or(defaults.timeout);
        for (k, v) in &defaults.extra_headers {
            self.extra_headers
                .entry(k.clone())
                .or_insert_with(|| v.clone());
        }
        for (k, v) in &defaults.extra_body {
            self.extra_body.entry(k.clone()).or_insert_with(|| v.clone());
        }
        self
    }
}

/// A chat completion request sent to the endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,

    pub messages: Vec<ChatMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    #[serde(flatten)]
    pub extra_body: serde_json::Map<String, serde_json::Value>,

    /// Per-attempt timeout; `None` uses the provider default.
    #[serde(skip)]
    pub timeout: Option<Duration>,

    #[serde(skip)]
    pub extra_headers: HashMap<String, String>,
}

impl ChatRequest {
    /// Create a minimal chat request with a model and messages.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self::with_options(model, messages, CompletionOptions::default())
    }

    /// Build a request from a model, messages, and completion options.
    pub fn with_options(
        model: impl Into<String>,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
            seed: options.seed,
            stop: options.stop,
            tools: options.tools,
            tool_choice: options.tool_choice,
            stream: options.stream.filter(|&s| s),
            extra_body: options.extra_body,
            timeout: options.timeout,
            extra_headers: options.extra_headers,
        }
    }

    /// Whether the response should be read as an SSE delta stream.
    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

/// A chat completion response (OpenAI format).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub choices: Vec<Choice>,

    #[serde(default)]
    pub usage: Option<Usage>,

    #[serde(default)]
    pub model: String,
}

impl ChatResponse {
    /// A response holding a single assistant message.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage {
                    role: Some("assistant".into()),
                    content: Some(text.into()),
                },
                finish_reason: Some("stop".into()),
            }],
            ..Self::default()
        }
    }

    /// The first choice's message content, or empty text when absent.
    pub fn first_content(&self) -> String {
        self.choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default()
    }
}

/// A single completion choice within a response.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Choice {
    #[serde(default)]
    pub index: i32,

    #[serde(default)]
    pub message: ResponseMessage,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The assistant message inside a [`Choice`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage statistics for a completion request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

// ── Streaming wire types ────────────────────────────────────────────────

/// One `chat.completion.chunk` object from an SSE `data:` line.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StreamDelta {
    #[serde(default)]
    pub choices: Vec<StreamDeltaChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StreamDeltaChoice {
    #[serde(default)]
    pub delta: StreamDeltaContent,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct StreamDeltaContent {
    #[serde(default)]
    pub content: Option<String>,
}
