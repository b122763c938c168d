//! Process-wide application context.
//!
//! Built once at startup and shared by every request. Holds the configuration
//! and the orchestrator wired to the real capabilities.

use std::sync::Arc;
use std::time::Duration;

use scipip_llm::{Completion, LlmClient};
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::corpus::CorpusRetriever;
use crate::error::ConfigError;
use crate::llm_stages::LlmStages;
use crate::pipeline::{Capabilities, Orchestrator};

/// Shared state for the server and CLI.
#[derive(Debug, Clone)]
pub struct AppContext {
    config: Arc<ServiceConfig>,
    orchestrator: Arc<Orchestrator>,
}

impl AppContext {
    /// Validate the LLM settings, load the corpus, and wire the pipeline.
    pub fn new(config: ServiceConfig) -> Result<Self, ConfigError> {
        config.llm.validate()?;

        let llm: Arc<dyn Completion> = Arc::new(LlmClient::new(config.llm.clone()));
        let stages = Arc::new(LlmStages::new(llm).with_max_ideas(config.generation.max_ideas));

        let corpus = match &config.retrieval.corpus_path {
            Some(path) => CorpusRetriever::from_path(path)?,
            None => {
                warn!("no literature corpus configured; retrieval will return no papers");
                CorpusRetriever::new(Vec::new())
            }
        };
        let retriever = Arc::new(
            corpus
                .with_top_k(config.retrieval.top_k)
                .with_follow_citations(config.retrieval.follow_citations),
        );

        let capabilities = Capabilities {
            entities: stages.clone(),
            expander: stages.clone(),
            brainstormer: stages.clone(),
            retriever,
            ideas: stages,
        };
        info!(
            endpoint = %config.llm.name,
            model = %config.llm.model,
            "pipeline backend ready"
        );
        Ok(Self::with_capabilities(config, capabilities))
    }

    /// Wire the pipeline to the given capabilities.
    pub fn with_capabilities(config: ServiceConfig, capabilities: Capabilities) -> Self {
        let orchestrator =
            Orchestrator::new(capabilities).with_entity_limit(config.generation.entity_limit);
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn request_budget(&self) -> Duration {
        self.config.request_budget()
    }
}
