//! Local literature corpus.
//!
//! [`CorpusRetriever`] serves [`LiteratureRetriever`] from a JSON array of
//! paper records held in memory. Papers are scored by how many entities
//! occur in their title or abstract; the best matches can pull in the papers
//! their related-work sections cite.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::CapabilityResult;
use crate::pipeline::{LiteratureRetriever, Paper, RetrievalOptions};
use crate::refs::{HashId, extract_citations};

/// Default number of papers returned per retrieval.
pub const DEFAULT_TOP_K: usize = 10;

/// In-memory paper corpus with entity matching.
#[derive(Debug, Clone)]
pub struct CorpusRetriever {
    papers: Vec<Paper>,
    by_hash: HashMap<HashId, usize>,
    top_k: usize,
    follow_citations: bool,
}

impl CorpusRetriever {
    pub fn new(papers: Vec<Paper>) -> Self {
        let mut by_hash = HashMap::with_capacity(papers.len());
        for (i, paper) in papers.iter().enumerate() {
            by_hash.entry(paper.hash_id()).or_insert(i);
        }
        Self {
            papers,
            by_hash,
            top_k: DEFAULT_TOP_K,
            follow_citations: true,
        }
    }

    /// Load a corpus from a JSON file containing an array of papers.
    pub fn from_path(path: &Path) -> CapabilityResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let papers: Vec<Paper> = serde_json::from_str(&raw)?;
        info!(path = %path.display(), papers = papers.len(), "loaded literature corpus");
        Ok(Self::new(papers))
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_follow_citations(mut self, follow: bool) -> Self {
        self.follow_citations = follow;
        self
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    fn score(paper: &Paper, needles: &[String]) -> usize {
        let title = paper.title.to_lowercase();
        let abstract_text = paper.abstract_text.to_lowercase();
        needles
            .iter()
            .filter(|n| title.contains(n.as_str()) || abstract_text.contains(n.as_str()))
            .count()
    }

    /// Indices of papers cited by the related-work sections of `seeds`.
    fn cited_by(&self, seeds: &[usize]) -> Vec<usize> {
        seeds
            .iter()
            .filter_map(|&i| {
                let paper = &self.papers[i];
                paper
                    .related_work
                    .as_deref()
                    .map(|text| extract_citations(text, &paper.references))
            })
            .flatten()
            .filter_map(|id| self.by_hash.get(&id).copied())
            .collect()
    }
}

#[async_trait]
impl LiteratureRetriever for CorpusRetriever {
    async fn retrieve(
        &self,
        _background: &str,
        entities: &[String],
        options: &RetrievalOptions,
    ) -> CapabilityResult<Vec<Paper>> {
        if options.need_evaluate {
            debug!("relevance evaluation requested; corpus scoring is keyword based");
        }

        let needles: Vec<String> = entities
            .iter()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        let targets: HashSet<HashId> = options.target_paper_ids.iter().copied().collect();

        let mut scored: Vec<(usize, usize)> = self
            .papers
            .iter()
            .enumerate()
            .filter(|(_, p)| targets.is_empty() || targets.contains(&p.hash_id()))
            .map(|(i, p)| (i, Self::score(p, &needles)))
            .filter(|&(_, score)| score > 0)
            .collect();
        scored.sort_by(|a, b| {
            Reverse(a.1)
                .cmp(&Reverse(b.1))
                .then_with(|| self.papers[a.0].title.cmp(&self.papers[b.0].title))
        });
        scored.truncate(self.top_k);

        let mut picked: Vec<usize> = scored.into_iter().map(|(i, _)| i).collect();
        if self.follow_citations && picked.len() < self.top_k {
            let mut seen: HashSet<usize> = picked.iter().copied().collect();
            for cited in self.cited_by(&picked) {
                if picked.len() >= self.top_k {
                    break;
                }
                let allowed =
                    targets.is_empty() || targets.contains(&self.papers[cited].hash_id());
                if allowed && seen.insert(cited) {
                    picked.push(cited);
                }
            }
        }

        debug!(entities = needles.len(), papers = picked.len(), "corpus retrieval");
        Ok(picked.into_iter().map(|i| self.papers[i].clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refs::hash_id;
    use std::io::Write;

    fn paper(title: &str, abstract_text: &str) -> Paper {
        Paper {
            abstract_text: abstract_text.to_string(),
            ..Paper::new(title, "neurips", 2020)
        }
    }

    fn corpus() -> Vec<Paper> {
        let mut survey = paper(
            "A Survey of Graph Neural Networks",
            "We review graph neural networks for molecules.",
        );
        survey.references = vec![
            "Semi-Supervised Classification with Graph Convolutional Networks".into(),
            "Attention Is All You Need".into(),
        ];
        survey.related_work = Some("GCNs [0] and transformers [1] are both used.".into());
        vec![
            survey,
            paper("Molecular Property Prediction", "Graph neural networks for drug discovery."),
            paper("Semi-Supervised Classification with Graph Convolutional Networks", ""),
            paper("Attention Is All You Need", "Sequence transduction."),
            paper("Protein Folding", "Unrelated biology."),
        ]
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    async fn titles(
        retriever: &CorpusRetriever,
        entities: &[&str],
        options: RetrievalOptions,
    ) -> Vec<String> {
        retriever
            .retrieve("bg", &strings(entities), &options)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect()
    }

    #[tokio::test]
    async fn ranks_by_matching_entities() {
        let retriever = CorpusRetriever::new(corpus()).with_follow_citations(false);
        let found = titles(
            &retriever,
            &["Graph Neural Networks", "drug discovery"],
            RetrievalOptions::default(),
        )
        .await;
        assert_eq!(
            found,
            vec!["Molecular Property Prediction", "A Survey of Graph Neural Networks"]
        );
    }

    #[tokio::test]
    async fn follows_citations_up_to_top_k() {
        let retriever = CorpusRetriever::new(corpus());
        let found = titles(&retriever, &["molecules"], RetrievalOptions::default()).await;
        assert_eq!(
            found,
            vec![
                "A Survey of Graph Neural Networks",
                "Semi-Supervised Classification with Graph Convolutional Networks",
                "Attention Is All You Need",
            ]
        );

        let capped = CorpusRetriever::new(corpus()).with_top_k(2);
        assert_eq!(titles(&capped, &["molecules"], RetrievalOptions::default()).await.len(), 2);
    }

    #[tokio::test]
    async fn target_ids_filter_results() {
        let retriever = CorpusRetriever::new(corpus());
        let options = RetrievalOptions {
            target_paper_ids: vec![hash_id("attention is all you need")],
            ..RetrievalOptions::default()
        };
        let found = titles(&retriever, &["molecules", "sequence"], options).await;
        assert_eq!(found, vec!["Attention Is All You Need"]);
    }

    #[tokio::test]
    async fn no_entities_no_papers() {
        let retriever = CorpusRetriever::new(corpus());
        assert!(titles(&retriever, &[" ", ""], RetrievalOptions::default()).await.is_empty());
    }

    #[tokio::test]
    async fn loads_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"title": "Graph Attention Networks", "abstract": "attention on graphs",
                 "venue_name": "iclr", "year": 2018, "doi": "10.1/abc"}}]"#
        )
        .unwrap();

        let retriever = CorpusRetriever::from_path(file.path()).unwrap();
        assert_eq!(retriever.len(), 1);
        let papers = retriever
            .retrieve("bg", &strings(&["graphs"]), &RetrievalOptions::default())
            .await
            .unwrap();
        assert_eq!(papers[0].summary(), "Graph Attention Networks. ICLR 2018.");
        assert_eq!(papers[0].extra["doi"], "10.1/abc");
    }

    #[test]
    fn missing_or_malformed_file_is_an_error() {
        assert!(CorpusRetriever::from_path(Path::new("/nonexistent/corpus.json")).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(CorpusRetriever::from_path(file.path()).is_err());
    }
}
