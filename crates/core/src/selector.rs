//! Similarity-ranked context selection over an embedded corpus.

use crate::embeddings::{cosine_similarity, embed_query, Embedder};
use crate::models::EmbeddedCorpus;
use crate::retry::RetryPolicy;
use std::cmp::Ordering;
use tracing::warn;

pub const CONTEXT_DELIMITER: &str = "\n-----\n";

/// Returned instead of context when nothing could be collected from the site.
pub const NO_CONTEXT_FALLBACK: &str = "No documentation could be collected from the project website. \
Judge the project accordingly: missing public information is itself a negative signal.";

pub struct ContextSelector<'a> {
    embedder: &'a dyn Embedder,
    retry: RetryPolicy,
}

impl<'a> ContextSelector<'a> {
    pub fn new(embedder: &'a dyn Embedder, retry: RetryPolicy) -> Self {
        Self { embedder, retry }
    }

    pub async fn select(&self, corpus: &EmbeddedCorpus, query: &str, top_k: usize) -> String {
        if corpus.is_empty() {
            return NO_CONTEXT_FALLBACK.to_string();
        }

        let order = match embed_query(self.embedder, query, self.retry).await {
            Some(query_vector) => rank_chunks(&corpus.embeddings, &query_vector, top_k),
            None => {
                warn!(top_k, "query embedding failed, using chunks in corpus order");
                (0..corpus.len().min(top_k)).collect()
            }
        };

        join_chunks(corpus, &order)
    }
}

/// Indices of the `top_k` most similar embeddings, most similar first.
/// Equal scores keep corpus order.
pub fn rank_chunks(embeddings: &[Vec<f32>], query_vector: &[f32], top_k: usize) -> Vec<usize> {
    let mut scored: Vec<(usize, f32)> = embeddings
        .iter()
        .enumerate()
        .map(|(index, embedding)| (index, cosine_similarity(query_vector, embedding)))
        .collect();

    // sort_by is stable, so ties stay in corpus order
    scored.sort_by(|left, right| right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal));
    scored.into_iter().take(top_k).map(|(index, _)| index).collect()
}

fn join_chunks(corpus: &EmbeddedCorpus, order: &[usize]) -> String {
    order
        .iter()
        .filter_map(|&index| corpus.chunks.get(index))
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::models::TextChunk;
    use async_trait::async_trait;

    /// Maps known words onto fixed axes so similarities are predictable.
    struct AxisEmbedder;

    fn axis_vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; 3];
        if text.contains("token") {
            vector[0] += 1.0;
        }
        if text.contains("team") {
            vector[1] += 1.0;
        }
        if text.contains("roadmap") {
            vector[2] += 1.0;
        }
        vector
    }

    #[async_trait]
    impl Embedder for AxisEmbedder {
        fn dimensions(&self) -> usize {
            3
        }

        async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Ok(inputs.iter().map(|input| axis_vector(input)).collect())
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        fn dimensions(&self) -> usize {
            3
        }

        async fn embed_batch(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Err(ProviderError::EmptyResponse {
                provider: "down".to_string(),
            })
        }
    }

    fn corpus(texts: &[&str]) -> EmbeddedCorpus {
        let mut corpus = EmbeddedCorpus::default();
        for (index, text) in texts.iter().enumerate() {
            corpus.push(
                TextChunk {
                    text: text.to_string(),
                    source_url: "https://project.io".to_string(),
                    index,
                },
                axis_vector(text),
            );
        }
        corpus
    }

    #[tokio::test]
    async fn empty_corpus_returns_fallback_sentence() {
        let selector = ContextSelector::new(&AxisEmbedder, RetryPolicy::immediate(1));
        let context = selector
            .select(&EmbeddedCorpus::default(), "token", 10)
            .await;
        assert_eq!(context, NO_CONTEXT_FALLBACK);
    }

    #[tokio::test]
    async fn selects_most_similar_first() {
        let corpus = corpus(&["the roadmap", "the team", "token and team", "token supply"]);
        let selector = ContextSelector::new(&AxisEmbedder, RetryPolicy::immediate(1));

        let context = selector.select(&corpus, "token", 2).await;
        assert_eq!(context, format!("token supply{CONTEXT_DELIMITER}token and team"));
    }

    #[tokio::test]
    async fn selection_is_idempotent() {
        let corpus = corpus(&["the roadmap", "the team", "token and team", "token supply"]);
        let selector = ContextSelector::new(&AxisEmbedder, RetryPolicy::immediate(1));

        let first = selector.select(&corpus, "team roadmap", 3).await;
        let second = selector.select(&corpus, "team roadmap", 3).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn top_k_zero_and_oversized_top_k() {
        let corpus = corpus(&["the roadmap", "the team"]);
        let selector = ContextSelector::new(&AxisEmbedder, RetryPolicy::immediate(1));

        assert_eq!(selector.select(&corpus, "team", 0).await, "");
        let everything = selector.select(&corpus, "team", 50).await;
        assert_eq!(everything, format!("the team{CONTEXT_DELIMITER}the roadmap"));
    }

    #[tokio::test]
    async fn query_embedding_failure_falls_back_to_corpus_order() {
        let corpus = corpus(&["the roadmap", "the team", "token supply"]);
        let selector = ContextSelector::new(&DownEmbedder, RetryPolicy::immediate(2));

        let context = selector.select(&corpus, "token", 2).await;
        assert_eq!(context, format!("the roadmap{CONTEXT_DELIMITER}the team"));
    }

    #[test]
    fn ties_keep_first_occurrence() {
        let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]];
        let order = rank_chunks(&embeddings, &[1.0, 0.0], 3);
        assert_eq!(order, vec![0, 2, 1]);
    }
}
