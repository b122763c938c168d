//! Stage names and per-stage outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::Idea;

/// The six pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    ExtractEntities,
    ExpandBackground,
    Brainstorm,
    ExtractEntitiesLiterature,
    RetrieveLiterature,
    GenerateIdeas,
}

impl StageName {
    pub const ALL: [StageName; 6] = [
        StageName::ExtractEntities,
        StageName::ExpandBackground,
        StageName::Brainstorm,
        StageName::ExtractEntitiesLiterature,
        StageName::RetrieveLiterature,
        StageName::GenerateIdeas,
    ];

    pub fn first() -> Self {
        StageName::ExtractEntities
    }

    /// The stage that runs after this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::ExtractEntities => Some(Self::ExpandBackground),
            Self::ExpandBackground => Some(Self::Brainstorm),
            Self::Brainstorm => Some(Self::ExtractEntitiesLiterature),
            Self::ExtractEntitiesLiterature => Some(Self::RetrieveLiterature),
            Self::RetrieveLiterature => Some(Self::GenerateIdeas),
            Self::GenerateIdeas => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExtractEntities => "extract_entities",
            Self::ExpandBackground => "expand_background",
            Self::Brainstorm => "brainstorm",
            Self::ExtractEntitiesLiterature => "extract_entities_literature",
            Self::RetrieveLiterature => "retrieve_literature",
            Self::GenerateIdeas => "generate_ideas",
        }
    }

    /// Progress text shown when the stage starts.
    pub fn start_message(self) -> &'static str {
        match self {
            Self::ExtractEntities => "Extracting entities from the user's input...",
            Self::ExpandBackground => "Understanding the user's input...",
            Self::Brainstorm => "Brainstorming...",
            Self::ExtractEntitiesLiterature => "Extracting entities for literature retrieval...",
            Self::RetrieveLiterature => "Retrieving related works...",
            Self::GenerateIdeas => "Generating ideas... (This may take up to 5 minutes)",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage that did not succeed, with a human-readable reason.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct StageFailure {
    pub stage: StageName,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: StageName, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// What a successful stage produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StagePayload {
    /// Stages 1 and 4.
    Entities(Vec<String>),
    ExpandedBackground(String),
    Brainstorm(Vec<String>),
    Literature {
        related_works: Vec<String>,
        count: usize,
    },
    Ideas {
        initial_count: usize,
        final_count: usize,
        ideas: Vec<Idea>,
    },
}

impl StagePayload {
    /// Completion text for the stage that produced this payload.
    pub fn message(&self, stage: StageName) -> String {
        match (stage, self) {
            (StageName::ExtractEntitiesLiterature, Self::Entities(e)) => format!(
                "Successfully extracted {} entities for literature retrieval",
                e.len()
            ),
            (_, Self::Entities(e)) => format!("Successfully extracted {} entities", e.len()),
            (_, Self::ExpandedBackground(_)) => "Background expanded successfully".into(),
            (_, Self::Brainstorm(_)) => "Brainstorming completed successfully".into(),
            (_, Self::Literature { count, .. }) => {
                format!("Successfully retrieved {count} related papers")
            }
            (_, Self::Ideas { initial_count, .. }) => {
                format!("Successfully generated {initial_count} ideas")
            }
        }
    }
}

/// The result of running one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Success(StagePayload),
    Failure(StageFailure),
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
