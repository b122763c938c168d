//! Capability traits the orchestrator calls into.
//!
//! Each stage delegates its real work to one of these. `Ok(None)` is the
//! "no result" answer (the model returned nothing usable); `Err` is a
//! raised failure. How either is treated depends on the stage.

use std::sync::Arc;

use async_trait::async_trait;

use super::state::Paper;
use crate::error::CapabilityResult;
use crate::refs::HashId;

/// Extracts key entities (methods, tasks, datasets, concepts) from text.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract_entities(
        &self,
        text: &str,
        limit: Option<usize>,
    ) -> CapabilityResult<Option<Vec<String>>>;
}

/// Rewrites a short background into a fuller research context.
#[async_trait]
pub trait BackgroundExpander: Send + Sync {
    /// `keywords` is the comma-separated entity list from stage 1 (possibly
    /// empty).
    async fn expand_background(
        &self,
        background: &str,
        keywords: &str,
    ) -> CapabilityResult<Option<String>>;
}

/// Produces brainstorm items for an expanded background.
#[async_trait]
pub trait Brainstormer: Send + Sync {
    async fn brainstorm(&self, background: &str) -> CapabilityResult<Option<Vec<String>>>;
}

/// Knobs passed through to a [`LiteratureRetriever`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalOptions {
    /// Score retrieved papers against `target_paper_ids`.
    pub need_evaluate: bool,
    /// Restrict results to these papers when non-empty.
    pub target_paper_ids: Vec<HashId>,
}

/// Finds papers related to a background and entity set.
#[async_trait]
pub trait LiteratureRetriever: Send + Sync {
    async fn retrieve(
        &self,
        background: &str,
        entities: &[String],
        options: &RetrievalOptions,
    ) -> CapabilityResult<Vec<Paper>>;
}

/// Output of an [`IdeaGenerator`]: concise ideas and, position by position,
/// their detailed versions. The two need not have the same length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedIdeas {
    pub initial: Vec<String>,
    pub detailed: Vec<Option<String>>,
}

/// Generates research ideas from the background, brainstorm, and papers.
#[async_trait]
pub trait IdeaGenerator: Send + Sync {
    async fn generate_ideas(
        &self,
        background: &str,
        brainstorm: &[String],
        papers: &[Paper],
    ) -> CapabilityResult<GeneratedIdeas>;
}

/// The full set of capabilities one orchestrator uses.
#[derive(Clone)]
pub struct Capabilities {
    pub entities: Arc<dyn EntityExtractor>,
    pub expander: Arc<dyn BackgroundExpander>,
    pub brainstormer: Arc<dyn Brainstormer>,
    pub retriever: Arc<dyn LiteratureRetriever>,
    pub ideas: Arc<dyn IdeaGenerator>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
