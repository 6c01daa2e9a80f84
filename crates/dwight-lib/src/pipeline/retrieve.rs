use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info};

use crate::config::{CONTEXT_SEPARATOR, OVER_FETCH_MULTIPLIER};
use crate::embedding::{EmbeddingProvider, normalize_l2};
use crate::index::{CorpusIndex, DocumentChunk};
use crate::pipeline::intent::Intent;

/// A chunk that survived threshold filtering, with its ranking signals.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub chunk: DocumentChunk,
    /// Cosine similarity between the query and the chunk.
    pub score: f32,
    /// Whether the chunk's intent equals the query intent.
    pub intent_match: bool,
}

/// Intent-aware semantic search over a shared, read-only index.
pub struct Retriever {
    index: Arc<CorpusIndex>,
    provider: Arc<dyn EmbeddingProvider>,
    similarity_threshold: f32,
}

impl Retriever {
    /// `provider` must be the same model the index was built with.
    pub fn new(
        index: Arc<CorpusIndex>,
        provider: Arc<dyn EmbeddingProvider>,
        similarity_threshold: f32,
    ) -> Self {
        Self {
            index,
            provider,
            similarity_threshold,
        }
    }

    pub fn index(&self) -> &CorpusIndex {
        &self.index
    }

    /// Whether the index holds anything to retrieve.
    pub fn is_ready(&self) -> bool {
        !self.index.is_empty()
    }

    /// Ranked results for `query`: over-fetch, drop candidates below the
    /// similarity threshold, put intent matches first, keep `top_k`.
    ///
    /// An empty index or `top_k == 0` yields no results without embedding
    /// the query.
    pub fn search(
        &self,
        query: &str,
        intent: Intent,
        top_k: usize,
    ) -> anyhow::Result<Vec<RetrievalResult>> {
        if top_k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_vector = self
            .provider
            .embed(query)
            .context("Failed to embed query")?;
        normalize_l2(&mut query_vector);

        let fetch = top_k
            .saturating_mul(OVER_FETCH_MULTIPLIER)
            .min(self.index.len());
        let candidates = self.index.search(&query_vector, fetch)?;
        let fetched = candidates.len();

        let mut results: Vec<RetrievalResult> = candidates
            .into_iter()
            .filter(|c| c.score >= self.similarity_threshold)
            .filter_map(|c| {
                let chunk = self.index.chunk(c.idx)?;
                Some(RetrievalResult {
                    intent_match: chunk.intent == intent,
                    chunk: chunk.clone(),
                    score: c.score,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.intent_match
                .cmp(&a.intent_match)
                .then(b.score.total_cmp(&a.score))
        });
        results.truncate(top_k);

        debug!(
            fetched,
            kept = results.len(),
            threshold = self.similarity_threshold,
            "Filtered retrieval candidates"
        );
        Ok(results)
    }

    /// Context string for the prompt: the texts of [`Self::search`] joined
    /// in rank order. Empty when nothing relevant was found.
    pub fn retrieve(&self, query: &str, intent: Intent, top_k: usize) -> anyhow::Result<String> {
        let results = self.search(query, intent, top_k)?;
        if results.is_empty() {
            info!(results = 0, %intent, "Retrieved no relevant chunks");
            return Ok(String::new());
        }

        #[allow(clippy::cast_precision_loss)]
        let avg_score = results.iter().map(|r| r.score).sum::<f32>() / results.len() as f32;
        info!(results = results.len(), avg_score, %intent, "Retrieved context");

        Ok(results
            .iter()
            .map(|r| r.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RagConfig;
    use crate::index::store;
    use crate::pipeline::ingest;
    use crate::test_util::{FailingEmbedder, HashingEmbedder};
    use dwight_test_util::corpus::sample_corpus;

    /// Returns the same query vector for every text.
    struct FixedQuery(Vec<f32>);

    impl EmbeddingProvider for FixedQuery {
        fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(vec![self.0.clone(); texts.len()])
        }

        fn dimension(&self) -> usize {
            self.0.len()
        }
    }

    fn chunk(content: &str, intent: Intent) -> DocumentChunk {
        DocumentChunk {
            content: content.to_string(),
            source: format!("{content}.md"),
            bucket: "1_customer_support".to_string(),
            intent,
            chunk_index: 0,
        }
    }

    /// Scores against the query `[1, 0]`: a = 1.0, b = 0.0, c = 0.6.
    fn fixed_retriever(threshold: f32) -> Retriever {
        let index = CorpusIndex::from_parts(
            2,
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.6, 0.8]],
            vec![
                chunk("a", Intent::Support),
                chunk("b", Intent::Support),
                chunk("c", Intent::Sales),
            ],
        )
        .unwrap();
        Retriever::new(
            Arc::new(index),
            Arc::new(FixedQuery(vec![1.0, 0.0])),
            threshold,
        )
    }

    #[test]
    fn empty_index_returns_empty_context() {
        let retriever = Retriever::new(
            Arc::new(CorpusIndex::empty(8)),
            Arc::new(FailingEmbedder { dimension: 8 }),
            0.15,
        );
        assert!(!retriever.is_ready());
        // The query is never embedded, so the failing provider is not hit.
        assert_eq!(
            retriever
                .retrieve("How much does shipping cost?", Intent::Sales, 5)
                .unwrap(),
            ""
        );
    }

    #[test]
    fn zero_top_k_is_empty() {
        let retriever = fixed_retriever(0.0);
        assert!(retriever.search("q", Intent::Support, 0).unwrap().is_empty());
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let retriever = fixed_retriever(0.6);
        let hits = retriever.search("q", Intent::Support, 5).unwrap();
        let names: Vec<&str> = hits.iter().map(|h| h.chunk.content.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn intent_match_outranks_score() {
        let retriever = fixed_retriever(0.5);
        let hits = retriever.search("q", Intent::Sales, 5).unwrap();
        let names: Vec<&str> = hits.iter().map(|h| h.chunk.content.as_str()).collect();
        assert_eq!(names, vec!["c", "a"]);
        assert!(hits[0].intent_match);
        assert!(!hits[1].intent_match);
    }

    #[test]
    fn equal_scores_prefer_intent_match() {
        let index = CorpusIndex::from_parts(
            2,
            vec![vec![1.0, 0.0], vec![1.0, 0.0]],
            vec![chunk("sales", Intent::Sales), chunk("support", Intent::Support)],
        )
        .unwrap();
        let retriever = Retriever::new(
            Arc::new(index),
            Arc::new(FixedQuery(vec![1.0, 0.0])),
            0.15,
        );
        let hits = retriever.search("q", Intent::Support, 2).unwrap();
        assert_eq!(hits[0].chunk.content, "support");
        assert_eq!(hits[1].chunk.content, "sales");
        assert_eq!(hits[0].score, hits[1].score);
    }

    #[test]
    fn over_fetch_is_capped_and_results_truncated() {
        let retriever = fixed_retriever(0.0);
        let hits = retriever.search("q", Intent::Support, 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.content, "a");
        assert_eq!(retriever.search("q", Intent::Support, 50).unwrap().len(), 3);
    }

    #[test]
    fn context_joins_in_rank_order() {
        let retriever = fixed_retriever(0.5);
        let context = retriever.retrieve("q", Intent::Support, 5).unwrap();
        assert_eq!(context, "a\n\n---\n\nc");
    }

    #[test]
    fn nothing_above_threshold_is_empty_context() {
        let retriever = fixed_retriever(1.5);
        assert_eq!(retriever.retrieve("q", Intent::Support, 5).unwrap(), "");
    }

    #[test]
    fn raising_threshold_never_adds_results() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RagConfig {
            data_dir: tmp.path().join("data"),
            index_dir: tmp.path().join("index"),
            ..RagConfig::default()
        };
        sample_corpus(&config.data_dir);
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(128));
        let index = Arc::new(ingest::build_index(provider.as_ref(), &config).unwrap());

        let mut previous = usize::MAX;
        for threshold in [-1.0, 0.0, 0.1, 0.2, 0.4, 0.8, 1.01] {
            let retriever = Retriever::new(Arc::clone(&index), Arc::clone(&provider), threshold);
            let count = retriever
                .search("container tracking portal", Intent::Support, 5)
                .unwrap()
                .len();
            assert!(count <= previous, "threshold {threshold} returned {count}");
            previous = count;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn persisted_index_retrieves_identically() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RagConfig {
            data_dir: tmp.path().join("data"),
            index_dir: tmp.path().join("index"),
            ..RagConfig::default()
        };
        sample_corpus(&config.data_dir);
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(128));
        let built = ingest::rebuild(provider.as_ref(), &config).unwrap();
        let loaded = store::load(&config.index_dir).unwrap().unwrap();

        let query = "How do I request a quote for cargo?";
        let before = Retriever::new(Arc::new(built), Arc::clone(&provider), 0.15)
            .retrieve(query, Intent::Sales, 5)
            .unwrap();
        let after = Retriever::new(Arc::new(loaded), Arc::clone(&provider), 0.15)
            .retrieve(query, Intent::Sales, 5)
            .unwrap();
        assert!(!before.is_empty());
        assert_eq!(before, after);
    }

    #[test]
    fn relevant_chunk_ranks_first() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RagConfig {
            data_dir: tmp.path().join("data"),
            index_dir: tmp.path().join("index"),
            ..RagConfig::default()
        };
        sample_corpus(&config.data_dir);
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(256));
        let index = Arc::new(ingest::build_index(provider.as_ref(), &config).unwrap());
        let retriever = Retriever::new(index, provider, 0.15);

        let hits = retriever
            .search("escalation protocol for staff", Intent::Internal, 3)
            .unwrap();
        assert_eq!(hits[0].chunk.source, "escalation.md");
    }

    #[test]
    fn provider_failure_is_an_error() {
        let index = CorpusIndex::from_parts(2, vec![vec![1.0, 0.0]], vec![chunk("a", Intent::Support)])
            .unwrap();
        let retriever = Retriever::new(
            Arc::new(index),
            Arc::new(FailingEmbedder { dimension: 2 }),
            0.15,
        );
        let err = retriever.retrieve("q", Intent::Support, 5).unwrap_err();
        assert!(format!("{err:#}").contains("embedding backend unavailable"));
    }

    #[test]
    fn query_dimension_mismatch_is_an_error() {
        let index = CorpusIndex::from_parts(2, vec![vec![1.0, 0.0]], vec![chunk("a", Intent::Support)])
            .unwrap();
        let retriever = Retriever::new(
            Arc::new(index),
            Arc::new(FixedQuery(vec![1.0, 0.0, 0.0])),
            0.15,
        );
        assert!(retriever.search("q", Intent::Support, 5).is_err());
    }
}
