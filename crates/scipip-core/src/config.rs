//! Service configuration.
//!
//! Loaded from an optional JSON file, then overridden from the environment.
//! Every field has a default, so an empty file (or no file) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use scipip_llm::LlmSettings;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::corpus::DEFAULT_TOP_K;
use crate::error::ConfigError;
use crate::llm_stages::DEFAULT_MAX_IDEAS;
use crate::pipeline::DEFAULT_ENTITY_LIMIT;
use crate::transport::DEFAULT_REQUEST_TIMEOUT_SECS;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub api: ApiConfig,
    pub llm: LlmSettings,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            llm: LlmSettings::default(),
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
            log_level: "info".into(),
        }
    }
}

/// HTTP surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// CORS origins; `"*"` allows any origin.
    pub allowed_origins: Vec<String>,
    /// Budget for one whole pipeline run.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8888,
            allowed_origins: vec!["*".into()],
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Literature retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// JSON array of paper records. Without it retrieval returns nothing.
    pub corpus_path: Option<PathBuf>,
    pub top_k: usize,
    pub follow_citations: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            corpus_path: None,
            top_k: DEFAULT_TOP_K,
            follow_citations: true,
        }
    }
}

/// Idea generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_ideas: usize,
    /// Entity cap for the literature extraction stage.
    pub entity_limit: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_ideas: DEFAULT_MAX_IDEAS,
            entity_limit: DEFAULT_ENTITY_LIMIT,
        }
    }
}

impl ServiceConfig {
    /// Read `path` (if given) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides from `lookup`.
    ///
    /// Recognized variables: `SCIPIP_API_HOST`, `SCIPIP_API_PORT`,
    /// `SCIPIP_ALLOWED_ORIGINS` (comma separated), `SCIPIP_LOG_LEVEL`,
    /// `SCIPIP_CORPUS_PATH`, `MODEL_NAME`, `BASE_URL`, `MODEL_TYPE`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("SCIPIP_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = get("SCIPIP_API_PORT") {
            self.api.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "SCIPIP_API_PORT".into(),
                value: port.clone(),
            })?;
        }
        if let Some(origins) = get("SCIPIP_ALLOWED_ORIGINS") {
            self.api.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(level) = get("SCIPIP_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(path) = get("SCIPIP_CORPUS_PATH") {
            self.retrieval.corpus_path = Some(PathBuf::from(path));
        }
        if let Some(model) = get("MODEL_NAME") {
            self.llm.model = model;
        }
        if let Some(base_url) = get("BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Some(model_type) = get("MODEL_TYPE") {
            self.llm.model_type = model_type;
        }
        Ok(())
    }

    /// Budget for one pipeline run.
    pub fn request_budget(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    /// Filter directive used when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &str {
        if self.log_level.trim().is_empty() {
            "info"
        } else {
            &self.log_level
        }
    }
}
