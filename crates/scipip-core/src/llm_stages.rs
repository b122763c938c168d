//! Stage capabilities backed by a chat completion model.
//!
//! [`LlmStages`] implements entity extraction, background expansion,
//! brainstorming, and idea generation as prompts over any [`Completion`].
//! Output parsing is lenient: entities go through the JSON repair pass and
//! list answers are read line by line.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use scipip_llm::{ChatMessage, Completion, CompletionOptions};
use tracing::{debug, warn};

use crate::error::{CapabilityError, CapabilityResult};
use crate::json_repair::parse_with_repair;
use crate::pipeline::{
    BackgroundExpander, Brainstormer, EntityExtractor, GeneratedIdeas, IdeaGenerator, Paper,
};

/// Default number of concise ideas requested per run.
pub const DEFAULT_MAX_IDEAS: usize = 5;

/// Abstract text shown to the model per paper.
const ABSTRACT_PREVIEW_CHARS: usize = 600;

const SYSTEM_PROMPT: &str = "You are an experienced researcher who helps scientists \
    find novel, feasible research ideas. Answer precisely and follow the requested output format.";

/// Prompt-driven implementations of the model-backed stages.
pub struct LlmStages {
    llm: Arc<dyn Completion>,
    options: CompletionOptions,
    max_ideas: usize,
}

impl LlmStages {
    pub fn new(llm: Arc<dyn Completion>) -> Self {
        Self {
            llm,
            options: CompletionOptions::default(),
            max_ideas: DEFAULT_MAX_IDEAS,
        }
    }

    /// Options sent with every prompt (on top of the client defaults).
    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_max_ideas(mut self, max_ideas: usize) -> Self {
        self.max_ideas = max_ideas.max(1);
        self
    }

    async fn ask(&self, prompt: String) -> CapabilityResult<String> {
        let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
        Ok(self.llm.complete(messages, &self.options).await?)
    }
}

#[async_trait]
impl EntityExtractor for LlmStages {
    async fn extract_entities(
        &self,
        text: &str,
        limit: Option<usize>,
    ) -> CapabilityResult<Option<Vec<String>>> {
        let how_many = match limit {
            Some(n) => format!("at most {n}"),
            None => "the".to_string(),
        };
        let prompt = format!(
            "Extract {how_many} key scientific entities (research tasks, methods, models, \
             datasets, and core concepts) from the text below. Answer with a JSON array of \
             short strings and nothing else.\n\nText:\n{text}"
        );
        let answer = self.ask(prompt).await?;
        let Some(mut entities) = parse_entities(&answer) else {
            warn!(chars = answer.len(), "could not parse entities from model output");
            return Ok(None);
        };
        if let Some(n) = limit {
            entities.truncate(n);
        }
        debug!(count = entities.len(), "entities extracted");
        Ok(Some(entities))
    }
}

#[async_trait]
impl BackgroundExpander for LlmStages {
    async fn expand_background(
        &self,
        background: &str,
        keywords: &str,
    ) -> CapabilityResult<Option<String>> {
        let keywords = if keywords.trim().is_empty() {
            "(none)"
        } else {
            keywords
        };
        let prompt = format!(
            "Expand the research background below into one detailed paragraph. Describe the \
             problem, why it matters, the current approaches and their limitations. Stay \
             faithful to the original and make use of the keywords.\n\n\
             Background:\n{background}\n\nKeywords: {keywords}"
        );
        let answer = self.ask(prompt).await?;
        let expanded = answer.trim();
        Ok((!expanded.is_empty()).then(|| expanded.to_string()))
    }
}

#[async_trait]
impl Brainstormer for LlmStages {
    async fn brainstorm(&self, background: &str) -> CapabilityResult<Option<Vec<String>>> {
        let prompt = format!(
            "Brainstorm possible research directions for the background below. Answer with a \
             numbered list, one direction per line, each a single sentence.\n\n\
             Background:\n{background}"
        );
        let answer = self.ask(prompt).await?;
        let mut items = parse_list_items(&answer);
        if items.is_empty() {
            debug!("brainstorm answer has no list markers, keeping its lines");
            items = plain_lines(&answer);
        }
        if items.is_empty() {
            warn!("empty brainstorm answer");
            return Ok(None);
        }
        Ok(Some(items))
    }
}

#[async_trait]
impl IdeaGenerator for LlmStages {
    async fn generate_ideas(
        &self,
        background: &str,
        brainstorm: &[String],
        papers: &[Paper],
    ) -> CapabilityResult<GeneratedIdeas> {
        let context = idea_context(background, brainstorm, papers);
        let prompt = format!(
            "{context}\n\nDrawing inspiration from the related papers and the brainstorm, \
             propose up to {} novel research ideas for the background. Answer with a numbered \
             list, one concise idea per line.",
            self.max_ideas
        );
        let answer = self.ask(prompt).await?;
        let mut initial = parse_list_items(&answer);
        initial.truncate(self.max_ideas);
        if initial.is_empty() {
            return Err(CapabilityError::message(
                "model output contained no ideas",
            ));
        }

        let mut detailed = Vec::with_capacity(initial.len());
        for (i, idea) in initial.iter().enumerate() {
            let prompt = format!(
                "{context}\n\nDevelop the following research idea in detail: motivation, \
                 method, experiments, and expected contributions.\n\nIdea: {idea}"
            );
            match self.ask(prompt).await {
                Ok(text) if !text.trim().is_empty() => detailed.push(Some(text.trim().to_string())),
                Ok(_) => {
                    warn!(idea = i + 1, "empty detailed idea");
                    detailed.push(None);
                }
                Err(e) => {
                    warn!(idea = i + 1, error = %e, "detailed idea generation failed");
                    detailed.push(None);
                }
            }
        }
        Ok(GeneratedIdeas { initial, detailed })
    }
}

/// Shared prompt preamble for idea generation.
fn idea_context(background: &str, brainstorm: &[String], papers: &[Paper]) -> String {
    let mut context = format!("Background:\n{background}\n");
    if !brainstorm.is_empty() {
        context.push_str("\nBrainstorm:\n");
        for item in brainstorm {
            context.push_str(&format!("- {item}\n"));
        }
    }
    if !papers.is_empty() {
        context.push_str("\nRelated papers:\n");
        for (i, paper) in papers.iter().enumerate() {
            context.push_str(&format!("{}. {}\n", i + 1, paper.summary()));
            if !paper.abstract_text.is_empty() {
                let preview: String = paper
                    .abstract_text
                    .chars()
                    .take(ABSTRACT_PREVIEW_CHARS)
                    .collect();
                context.push_str(&format!("   {preview}\n"));
            }
        }
    }
    context
}

/// Read a list of entity strings out of model output.
///
/// Accepts a JSON array, or an object with an `entities` array. Entries are
/// trimmed; empty and repeated entries are dropped.
fn parse_entities(answer: &str) -> Option<Vec<String>> {
    let value = parse_with_repair(answer).ok()?;
    let items = match &value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(map) => map.get("entities")?.as_array()?,
        _ => return None,
    };

    let mut seen = HashSet::new();
    Some(
        items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
            .map(str::to_string)
            .collect(),
    )
}

/// Items of a numbered (`1.`, `2)`) or bulleted (`-`, `*`, `•`) list.
fn parse_list_items(answer: &str) -> Vec<String> {
    answer
        .lines()
        .filter_map(|line| strip_list_marker(line.trim()))
        .map(|item| item.trim_matches('*').trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Non-empty lines of an answer that is not a list.
fn plain_lines(answer: &str) -> Vec<String> {
    answer
        .lines()
        .map(|line| line.trim().trim_matches('*').trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> Option<&str> {
    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return Some(rest);
        }
    }
    // Markdown emphasis or headings around a number: `**1.**`, `### 2.`
    let line = line.trim_start_matches(['*', '#']).trim_start();
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    rest.strip_prefix('.')
        .or_else(|| rest.strip_prefix(')'))
        .map(str::trim_start)
}
