//! Data accumulated by one pipeline run.

use serde::{Deserialize, Serialize};

use crate::refs::{HashId, hash_id};

/// A retrieved paper record.
///
/// The fields the pipeline reads are typed; everything else in the source
/// record is kept in `extra` so the record passes through intact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    #[serde(default)]
    pub title: String,

    #[serde(default, rename = "abstract", skip_serializing_if = "String::is_empty")]
    pub abstract_text: String,

    #[serde(default)]
    pub venue_name: String,

    #[serde(default)]
    pub year: Option<i32>,

    /// Related-work section text with numeric citation markers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_work: Option<String>,

    /// Reference list that the citation markers index into.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Paper {
    pub fn new(title: impl Into<String>, venue_name: impl Into<String>, year: i32) -> Self {
        Self {
            title: title.into(),
            venue_name: venue_name.into(),
            year: Some(year),
            ..Self::default()
        }
    }

    /// Human-readable citation: `"{title}. {VENUE} {year}."`.
    pub fn summary(&self) -> String {
        let year = self.year.map(|y| y.to_string()).unwrap_or_default();
        format!("{}. {} {}.", self.title, self.venue_name.to_uppercase(), year)
    }

    /// Content hash of the title.
    pub fn hash_id(&self) -> HashId {
        hash_id(&self.title)
    }
}

/// One generated idea: a concise statement and, when its detail call
/// succeeded, the elaborated version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idea {
    /// 1-based position.
    pub index: usize,
    pub concise_idea: String,
    pub idea_in_detail: Option<String>,
}

/// Pair concise ideas with their detailed versions by position.
///
/// One [`Idea`] per concise idea; a missing or failed detail yields
/// `idea_in_detail: None`. Extra details without a concise idea are dropped.
pub fn pair_ideas(initial: &[String], detailed: &[Option<String>]) -> Vec<Idea> {
    initial
        .iter()
        .enumerate()
        .map(|(i, concise)| Idea {
            index: i + 1,
            concise_idea: concise.clone(),
            idea_in_detail: detailed.get(i).cloned().flatten(),
        })
        .collect()
}

/// Everything one run has produced so far. Owned by a single run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineState {
    pub background: String,
    pub entities_background: Vec<String>,
    pub expanded_background: Option<String>,
    pub brainstorm_items: Vec<String>,
    pub entities_literature: Vec<String>,
    /// Citation summaries, parallel to `related_papers`.
    pub related_works: Vec<String>,
    pub related_papers: Vec<Paper>,
    pub initial_ideas: Vec<String>,
    pub final_ideas: Vec<Option<String>>,
}

impl PipelineState {
    pub fn new(background: impl Into<String>) -> Self {
        Self {
            background: background.into(),
            ..Self::default()
        }
    }

    pub fn ideas(&self) -> Vec<Idea> {
        pair_ideas(&self.initial_ideas, &self.final_ideas)
    }
}
