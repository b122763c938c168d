//! Connection settings for the upstream chat completion endpoint.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, Result};
use crate::types::CompletionOptions;

/// Default per-attempt timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Model type that runs without an API key.
const LOCAL_MODEL_TYPE: &str = "Local";

/// How to reach the chat completion endpoint and which defaults to send.
///
/// Stores the *name* of the environment variable holding the API key, never
/// the key itself, so the settings can be logged and serialized safely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Human-readable endpoint name used in logs.
    pub name: String,

    /// Base URL, with or without a trailing `/v1`.
    pub base_url: String,

    /// Environment variable that holds the API key.
    pub api_key_env: String,

    /// Model identifier sent with every request.
    pub model: String,

    /// `"Local"` disables the API-key requirement.
    pub model_type: String,

    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,

    /// Read responses as SSE delta streams.
    pub stream: bool,

    /// Extra HTTP headers sent with every request.
    pub headers: HashMap<String, String>,

    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub seed: Option<i64>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            name: "openai-compat".into(),
            base_url: "https://api.openai.com/v1".into(),
            api_key_env: "MODEL_API_KEY".into(),
            model: "gpt-4o".into(),
            model_type: "OpenAI".into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            stream: false,
            headers: HashMap::new(),
            temperature: None,
            top_p: None,
            max_tokens: None,
            seed: None,
        }
    }
}

impl LlmSettings {
    /// Default per-attempt timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether the configured model needs an API key.
    pub fn requires_api_key(&self) -> bool {
        self.model_type != LOCAL_MODEL_TYPE
    }

    /// The chat completions URL derived from `base_url`.
    pub fn completions_url(&self) -> String {
        completions_endpoint(&self.base_url)
    }

    /// Completion options every request starts from.
    pub fn default_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            seed: self.seed,
            stream: self.stream.then_some(true),
            timeout: Some(self.timeout()),
            ..CompletionOptions::default()
        }
    }

    /// Check that the settings are usable before any request is sent.
    ///
    /// The API key is looked up in the environment unless the model type is
    /// `Local`.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ProviderError::NotConfigured("base_url is not set".into()));
        }
        if self.model.trim().is_empty() {
            return Err(ProviderError::NotConfigured("model is not set".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ProviderError::NotConfigured(
                "timeout_secs must be positive".into(),
            ));
        }
        if self.requires_api_key() {
            match std::env::var(&self.api_key_env) {
                Ok(key) if !key.is_empty() => {}
                _ => {
                    return Err(ProviderError::NotConfigured(format!(
                        "{} is not set",
                        self.api_key_env
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Build the chat completions endpoint for a base URL.
///
/// `…/v1` gets `/chat/completions`; anything else gets
/// `/v1/chat/completions`. Trailing slashes are ignored.
pub fn completions_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_for_v1_base() {
        assert_eq!(
            completions_endpoint("https://api.example.com/v1"),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn endpoint_appends_v1() {
        assert_eq!(
            completions_endpoint("http://10.0.0.5:3888"),
            "http://10.0.0.5:3888/v1/chat/completions"
        );
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        assert_eq!(
            completions_endpoint("https://api.example.com/v1/"),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            completions_endpoint("http://localhost:8000/"),
            "http://localhost:8000/v1/chat/completions"
        );
    }

    #[test]
    fn default_timeout_is_600_seconds() {
        let settings = LlmSettings::default();
        assert_eq!(settings.timeout(), Duration::from_secs(600));
        assert_eq!(
            settings.default_options().timeout,
            Some(Duration::from_secs(600))
        );
    }

    #[test]
    fn validate_missing_key() {
        let settings = LlmSettings {
            api_key_env: "SCIPIP_TEST_MISSING_KEY_81723".into(),
            ..LlmSettings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert!(err.to_string().contains("SCIPIP_TEST_MISSING_KEY_81723"));
    }

    #[test]
    fn validate_local_model_needs_no_key() {
        let settings = LlmSettings {
            api_key_env: "SCIPIP_TEST_MISSING_KEY_81724".into(),
            model_type: "Local".into(),
            ..LlmSettings::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_model() {
        let settings = LlmSettings {
            model: " ".into(),
            model_type: "Local".into(),
            ..LlmSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn deserialize_partial_settings() {
        let json = r#"{"base_url": "http://localhost:3888", "model": "qwen2"}"#;
        let settings: LlmSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.model, "qwen2");
        assert_eq!(settings.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(settings.api_key_env, "MODEL_API_KEY");
        assert!(!settings.stream);
    }

    #[test]
    fn debug_contains_env_name_not_key() {
        let debug = format!("{:?}", LlmSettings::default());
        assert!(debug.contains("MODEL_API_KEY"));
    }
}
