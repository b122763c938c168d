//! Error types for the scipip pipeline.
//!
//! [`PipelineError`] is what a run reports to its caller. [`CapabilityError`]
//! is what an individual stage capability raises; the orchestrator turns it
//! into a [`StageFailure`] at the stage boundary. [`ConfigError`] covers
//! loading and validating the service configuration.

use std::path::PathBuf;

use scipip_llm::ProviderError;
use thiserror::Error;

use crate::pipeline::StageFailure;

/// Why a pipeline run did not produce a result.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The background was empty or whitespace; rejected before any stage ran.
    #[error("Empty background provided")]
    EmptyBackground,

    /// The request could not be read (malformed JSON, missing fields).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A stage failed; later stages did not run.
    #[error(transparent)]
    Stage(#[from] StageFailure),

    /// The overall request budget elapsed.
    #[error("Request timed out after {secs} seconds")]
    Timeout { secs: u64 },

    /// The run aborted for a reason outside the stage contracts (a panic in
    /// a capability, a cancelled task).
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl PipelineError {
    /// Whether the caller is at fault (maps to HTTP 400).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::EmptyBackground | Self::InvalidRequest(_))
    }

    /// Stable classification label for error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyBackground | Self::InvalidRequest(_) => "client_input",
            Self::Stage(_) => "stage_failure",
            Self::Timeout { .. } => "timeout",
            Self::Unexpected(_) => "unexpected",
        }
    }
}

/// Error raised by a stage capability.
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error(transparent)]
    Llm(#[from] ProviderError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Message(String),
}

impl CapabilityError {
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }
}

/// Result alias for capability calls.
pub type CapabilityResult<T> = std::result::Result<T, CapabilityError>;

/// Errors while loading configuration or building the application context.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: String, value: String },

    #[error("llm settings: {0}")]
    Llm(#[from] ProviderError),

    #[error("literature corpus: {0}")]
    Corpus(#[from] CapabilityError),
}
