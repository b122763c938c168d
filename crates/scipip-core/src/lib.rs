//! Scientific idea generation pipeline.
//!
//! Turns a free-text research background into research ideas grounded in
//! related literature. The crate holds everything between the HTTP surface
//! and the model endpoint:
//!
//! - [`pipeline`]: the six-stage [`Orchestrator`] and its capability traits
//! - [`transport`]: streaming ([`stream_pipeline`]) and buffered
//!   ([`generate_buffered`]) delivery of a run
//! - [`refs`]: citation marker parsing and reference hashing
//! - [`llm_stages`] and [`corpus`]: the production capabilities
//! - [`config`] and [`context`]: configuration and the shared [`AppContext`]

pub mod config;
pub mod context;
pub mod corpus;
pub mod error;
pub mod json_repair;
pub mod llm_stages;
pub mod pipeline;
pub mod refs;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::{ApiConfig, GenerationConfig, RetrievalConfig, ServiceConfig};
pub use context::AppContext;
pub use corpus::CorpusRetriever;
pub use error::{CapabilityError, CapabilityResult, ConfigError, PipelineError};
pub use llm_stages::LlmStages;
pub use pipeline::{
    Capabilities, Idea, Orchestrator, Paper, PipelineRun, PipelineState, StageFailure, StageName,
    StageOutcome,
};
pub use refs::{HashId, extract_citations, hash_id};
pub use transport::{
    DEFAULT_REQUEST_TIMEOUT_SECS, GenerateResponse, PipelineRequest, StepComplete, StreamEvent,
    generate_buffered, stream_pipeline,
};
