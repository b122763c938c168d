//! The six-stage idea-generation run.
//!
//! [`Orchestrator::start`] validates the background and returns a
//! [`PipelineRun`], a state machine that executes exactly one stage per
//! [`PipelineRun::step`]. The transport layer drives it step by step to emit
//! progress events; [`PipelineRun::finish`] drives it to completion for
//! callers that only want the final state.

use std::collections::{BTreeSet, HashSet};

use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::capabilities::{Capabilities, RetrievalOptions};
use super::stage::{StageFailure, StageName, StageOutcome, StagePayload};
use super::state::PipelineState;
use crate::error::{CapabilityResult, PipelineError};

/// Default cap on entities extracted from the brainstorm.
pub const DEFAULT_ENTITY_LIMIT: usize = 10;

/// Characters of the background shown in logs and acknowledgements.
const PREVIEW_CHARS: usize = 100;

/// The first 100 characters of `text`, with `...` appended when cut.
pub fn background_preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Runs pipelines against a fixed set of capabilities.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    capabilities: Capabilities,
    entity_limit: usize,
}

impl Orchestrator {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            entity_limit: DEFAULT_ENTITY_LIMIT,
        }
    }

    /// Limit passed to the brainstorm entity extraction.
    pub fn with_entity_limit(mut self, limit: usize) -> Self {
        self.entity_limit = limit;
        self
    }

    /// Begin a run. Empty or whitespace-only backgrounds are rejected
    /// before any capability is called.
    pub fn start(&self, background: &str) -> Result<PipelineRun, PipelineError> {
        if background.trim().is_empty() {
            warn!("rejecting empty background");
            return Err(PipelineError::EmptyBackground);
        }
        let run = PipelineRun {
            capabilities: self.capabilities.clone(),
            entity_limit: self.entity_limit,
            state: PipelineState::new(background),
            next: Some(StageName::first()),
            run_id: Uuid::new_v4(),
        };
        info!(
            run_id = %run.run_id,
            background = %background_preview(background),
            "pipeline run started"
        );
        Ok(run)
    }

    /// Run all six stages and return the final state.
    pub async fn run(&self, background: &str) -> Result<PipelineState, PipelineError> {
        self.start(background)?.finish().await
    }
}

/// One in-progress pipeline run.
///
/// Stage *n* only runs after stage *n-1* succeeded; after a failure
/// [`next_stage`](Self::next_stage) is `None` and the state is not advanced.
#[derive(Debug)]
pub struct PipelineRun {
    capabilities: Capabilities,
    entity_limit: usize,
    state: PipelineState,
    next: Option<StageName>,
    run_id: Uuid,
}

impl PipelineRun {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The stage the next [`step`](Self::step) will execute.
    pub fn next_stage(&self) -> Option<StageName> {
        self.next
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn into_state(self) -> PipelineState {
        self.state
    }

    /// Execute the next stage. Returns `None` once the run is over.
    pub async fn step(&mut self) -> Option<(StageName, StageOutcome)> {
        let stage = self.next?;
        let span = info_span!("stage", run_id = %self.run_id, stage = %stage);
        let outcome = self.execute(stage).instrument(span).await;

        match &outcome {
            StageOutcome::Success(_) => {
                info!(run_id = %self.run_id, stage = %stage, "stage complete");
                self.next = stage.next();
            }
            StageOutcome::Failure(failure) => {
                warn!(
                    run_id = %self.run_id,
                    stage = %stage,
                    reason = %failure.message,
                    "stage failed, halting run"
                );
                self.next = None;
            }
        }
        Some((stage, outcome))
    }

    /// Execute every remaining stage.
    pub async fn finish(mut self) -> Result<PipelineState, PipelineError> {
        while let Some((_, outcome)) = self.step().await {
            if let StageOutcome::Failure(failure) = outcome {
                return Err(failure.into());
            }
        }
        info!(
            run_id = %self.run_id,
            ideas = self.state.initial_ideas.len(),
            "pipeline run finished"
        );
        Ok(self.state)
    }

    async fn execute(&mut self, stage: StageName) -> StageOutcome {
        match stage {
            StageName::ExtractEntities => self.extract_entities().await,
            StageName::ExpandBackground => self.expand_background().await,
            StageName::Brainstorm => self.brainstorm().await,
            StageName::ExtractEntitiesLiterature => self.extract_literature_entities().await,
            StageName::RetrieveLiterature => self.retrieve_literature().await,
            StageName::GenerateIdeas => self.generate_ideas().await,
        }
    }

    async fn extract_entities(&mut self) -> StageOutcome {
        let result = self
            .capabilities
            .entities
            .extract_entities(&self.state.background, None)
            .await;
        let entities = entities_or_empty(StageName::ExtractEntities, result);
        self.state.entities_background = entities.clone();
        StageOutcome::Success(StagePayload::Entities(entities))
    }

    async fn expand_background(&mut self) -> StageOutcome {
        let stage = StageName::ExpandBackground;
        let keywords = self.state.entities_background.join(", ");
        match self
            .capabilities
            .expander
            .expand_background(&self.state.background, &keywords)
            .await
        {
            Ok(Some(expanded)) => {
                self.state.expanded_background = Some(expanded.clone());
                StageOutcome::Success(StagePayload::ExpandedBackground(expanded))
            }
            Ok(None) => failure(stage, "Failed to expand background (API timeout or error)"),
            Err(e) => failure(stage, format!("Background expansion failed: {e}")),
        }
    }

    async fn brainstorm(&mut self) -> StageOutcome {
        let stage = StageName::Brainstorm;
        let expanded = self.expanded_or_original().to_string();
        match self.capabilities.brainstormer.brainstorm(&expanded).await {
            Ok(Some(items)) => {
                self.state.brainstorm_items = items.clone();
                StageOutcome::Success(StagePayload::Brainstorm(items))
            }
            Ok(None) => failure(stage, "Failed to generate brainstorm (API timeout or error)"),
            Err(e) => failure(stage, format!("Brainstorming failed: {e}")),
        }
    }

    async fn extract_literature_entities(&mut self) -> StageOutcome {
        let stage = StageName::ExtractEntitiesLiterature;
        let from_brainstorm = if self.state.brainstorm_items.is_empty() {
            debug!("empty brainstorm, skipping entity extraction");
            Vec::new()
        } else {
            let text = self.state.brainstorm_items.join("\n");
            let result = self
                .capabilities
                .entities
                .extract_entities(&text, Some(self.entity_limit))
                .await;
            entities_or_empty(stage, result)
        };

        let combined: BTreeSet<String> = self
            .state
            .entities_background
            .iter()
            .cloned()
            .chain(from_brainstorm)
            .collect();
        let combined: Vec<String> = combined.into_iter().collect();
        self.state.entities_literature = combined.clone();
        StageOutcome::Success(StagePayload::Entities(combined))
    }

    async fn retrieve_literature(&mut self) -> StageOutcome {
        let stage = StageName::RetrieveLiterature;
        let expanded = self.expanded_or_original().to_string();
        let papers = match self
            .capabilities
            .retriever
            .retrieve(
                &expanded,
                &self.state.entities_literature,
                &RetrievalOptions::default(),
            )
            .await
        {
            Ok(papers) => papers,
            Err(e) => return failure(stage, format!("Literature retrieval failed: {e}")),
        };

        let mut seen = HashSet::new();
        let papers: Vec<_> = papers
            .into_iter()
            .filter(|paper| seen.insert(paper.hash_id()))
            .collect();
        let related_works: Vec<String> = papers.iter().map(|p| p.summary()).collect();
        let count = papers.len();
        debug!(count, "related papers retrieved");

        self.state.related_works = related_works.clone();
        self.state.related_papers = papers;
        StageOutcome::Success(StagePayload::Literature {
            related_works,
            count,
        })
    }

    async fn generate_ideas(&mut self) -> StageOutcome {
        let stage = StageName::GenerateIdeas;
        let generated = match self
            .capabilities
            .ideas
            .generate_ideas(
                &self.state.background,
                &self.state.brainstorm_items,
                &self.state.related_papers,
            )
            .await
        {
            Ok(generated) => generated,
            Err(e) => return failure(stage, format!("Idea generation failed: {e}")),
        };

        self.state.initial_ideas = generated.initial;
        self.state.final_ideas = generated.detailed;
        StageOutcome::Success(StagePayload::Ideas {
            initial_count: self.state.initial_ideas.len(),
            final_count: self.state.final_ideas.len(),
            ideas: self.state.ideas(),
        })
    }

    fn expanded_or_original(&self) -> &str {
        self.state
            .expanded_background
            .as_deref()
            .unwrap_or(&self.state.background)
    }
}

/// Entity stages never fail: a raised error or a `None` becomes an empty list.
fn entities_or_empty(
    stage: StageName,
    result: CapabilityResult<Option<Vec<String>>>,
) -> Vec<String> {
    match result {
        Ok(Some(entities)) => entities,
        Ok(None) => {
            debug!(stage = %stage, "no entities returned");
            Vec::new()
        }
        Err(e) => {
            warn!(stage = %stage, error = %e, "entity extraction failed, continuing without entities");
            Vec::new()
        }
    }
}

fn failure(stage: StageName, message: impl Into<String>) -> StageOutcome {
    StageOutcome::Failure(StageFailure::new(stage, message))
}
