//! The idea-generation pipeline.
//!
//! Six stages run strictly in order over one [`PipelineState`]:
//!
//! 1. **extract_entities** -- keywords from the user's background
//! 2. **expand_background** -- a fuller research context
//! 3. **brainstorm** -- candidate directions
//! 4. **extract_entities_literature** -- keywords from the brainstorm, unioned with stage 1
//! 5. **retrieve_literature** -- related papers and their citation summaries
//! 6. **generate_ideas** -- concise ideas and their detailed versions
//!
//! Stages 1 and 4 never fail. A failure in any other stage halts the run.

pub mod capabilities;
pub mod orchestrator;
pub mod stage;
pub mod state;

pub use capabilities::{
    BackgroundExpander, Brainstormer, Capabilities, EntityExtractor, GeneratedIdeas,
    IdeaGenerator, LiteratureRetriever, RetrievalOptions,
};
pub use orchestrator::{DEFAULT_ENTITY_LIMIT, Orchestrator, PipelineRun, background_preview};
pub use stage::{StageFailure, StageName, StageOutcome, StagePayload};
pub use state::{Idea, Paper, PipelineState, pair_ideas};
