//! Scripted in-memory capabilities for tests.
//!
//! [`FakeCapabilities`] answers every capability call from a fixed
//! [`Reply`] and records the call, so tests can assert both what the
//! pipeline produced and which capabilities it touched.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CapabilityError, CapabilityResult};
use crate::pipeline::{
    BackgroundExpander, Brainstormer, Capabilities, EntityExtractor, GeneratedIdeas,
    IdeaGenerator, LiteratureRetriever, Paper, RetrievalOptions,
};

/// How a fake capability answers.
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Value(T),
    /// `Ok(None)`, or an empty value for capabilities without an option.
    Nothing,
    Fail(String),
    Panic,
}

impl<T: Clone> Reply<T> {
    fn resolve(&self, capability: &str) -> CapabilityResult<Option<T>> {
        match self {
            Reply::Value(v) => Ok(Some(v.clone())),
            Reply::Nothing => Ok(None),
            Reply::Fail(msg) => Err(CapabilityError::message(msg.clone())),
            Reply::Panic => panic!("{capability} capability panicked"),
        }
    }
}

/// One recorded capability call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub capability: &'static str,
    /// The primary text argument.
    pub input: String,
    /// Secondary text argument (expansion keywords), empty otherwise.
    pub extra: String,
    /// Entity limit, for extraction calls.
    pub limit: Option<usize>,
}

/// Calls recorded by a [`FakeCapabilities`].
#[derive(Debug, Default)]
pub struct CallLog(Mutex<Vec<Call>>);

/// A full capability set answering from scripted replies.
///
/// Every field is public so tests can override replies with
/// `FakeCapabilities { brainstorm: ..., ..FakeCapabilities::happy() }`.
#[derive(Debug)]
pub struct FakeCapabilities {
    /// Stage 1 extraction (called without a limit).
    pub entities: Reply<Vec<String>>,
    /// Stage 4 extraction (called with a limit).
    pub literature_entities: Reply<Vec<String>>,
    pub expansion: Reply<String>,
    pub brainstorm: Reply<Vec<String>>,
    pub papers: Reply<Vec<Paper>>,
    pub ideas: Reply<GeneratedIdeas>,
    /// Sleep before answering each call.
    pub delay: Duration,
    pub calls: CallLog,
}

impl Default for FakeCapabilities {
    fn default() -> Self {
        Self {
            entities: Reply::Nothing,
            literature_entities: Reply::Nothing,
            expansion: Reply::Nothing,
            brainstorm: Reply::Nothing,
            papers: Reply::Nothing,
            ideas: Reply::Nothing,
            delay: Duration::ZERO,
            calls: CallLog::default(),
        }
    }
}

impl FakeCapabilities {
    /// Replies that carry a run through all six stages.
    ///
    /// Three concise ideas with two details; the paper list contains a
    /// case-variant duplicate title.
    pub fn happy() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            entities: Reply::Value(strings(&["graph neural networks", "drug discovery"])),
            literature_entities: Reply::Value(strings(&[
                "molecular graphs",
                "graph neural networks",
            ])),
            expansion: Reply::Value("Expanded: Graph learning for drugs".into()),
            brainstorm: Reply::Value(strings(&[
                "Use GNNs to predict toxicity",
                "Contrastive pretraining on molecules",
            ])),
            papers: Reply::Value(vec![
                Paper::new("Graph Attention Networks", "iclr", 2018),
                Paper::new("Neural Message Passing for Quantum Chemistry", "icml", 2017),
                Paper::new("graph attention networks", "arxiv", 2017),
            ]),
            ideas: Reply::Value(GeneratedIdeas {
                initial: strings(&["Idea one", "Idea two", "Idea three"]),
                detailed: vec![Some("Idea one in detail".into()), Some("Idea two in detail".into())],
            }),
            ..Self::default()
        }
    }

    /// Wrap `self` as a [`Capabilities`] bundle.
    pub fn capabilities(self: &Arc<Self>) -> Capabilities {
        Capabilities {
            entities: self.clone(),
            expander: self.clone(),
            brainstormer: self.clone(),
            retriever: self.clone(),
            ideas: self.clone(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.0.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.0.lock().map(|c| c.len()).unwrap_or_default()
    }

    async fn record(&self, capability: &'static str, input: &str, extra: &str, limit: Option<usize>) {
        if let Ok(mut calls) = self.calls.0.lock() {
            calls.push(Call {
                capability,
                input: input.to_string(),
                extra: extra.to_string(),
                limit,
            });
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl EntityExtractor for FakeCapabilities {
    async fn extract_entities(
        &self,
        text: &str,
        limit: Option<usize>,
    ) -> CapabilityResult<Option<Vec<String>>> {
        self.record("entities", text, "", limit).await;
        match limit {
            None => self.entities.resolve("entities"),
            Some(_) => self.literature_entities.resolve("entities"),
        }
    }
}

#[async_trait]
impl BackgroundExpander for FakeCapabilities {
    async fn expand_background(
        &self,
        background: &str,
        keywords: &str,
    ) -> CapabilityResult<Option<String>> {
        self.record("expand", background, keywords, None).await;
        self.expansion.resolve("expand")
    }
}

#[async_trait]
impl Brainstormer for FakeCapabilities {
    async fn brainstorm(&self, background: &str) -> CapabilityResult<Option<Vec<String>>> {
        self.record("brainstorm", background, "", None).await;
        self.brainstorm.resolve("brainstorm")
    }
}

#[async_trait]
impl LiteratureRetriever for FakeCapabilities {
    async fn retrieve(
        &self,
        background: &str,
        entities: &[String],
        _options: &RetrievalOptions,
    ) -> CapabilityResult<Vec<Paper>> {
        self.record("retrieve", background, &entities.join(", "), None)
            .await;
        Ok(self.papers.resolve("retrieve")?.unwrap_or_default())
    }
}

#[async_trait]
impl IdeaGenerator for FakeCapabilities {
    async fn generate_ideas(
        &self,
        background: &str,
        brainstorm: &[String],
        _papers: &[Paper],
    ) -> CapabilityResult<GeneratedIdeas> {
        self.record("ideas", background, &brainstorm.join("\n"), None)
            .await;
        Ok(self.ideas.resolve("ideas")?.unwrap_or_default())
    }
}
